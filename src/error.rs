//! Error types shared by the backend client, the stores and the report view.
//!
//! Every variant renders to a message fit for a toast; the IPC layer turns
//! them into plain strings.

use thiserror::Error;

/// Failure talking to the backend REST API.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    #[error("Backend not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Cannot reach the server at {0}")]
    Network(String),

    #[error("Connection to {0} timed out")]
    Timeout(String),

    #[error("Your session has expired, please sign in again")]
    Unauthorized,

    #[error("You are not allowed to perform this action")]
    Forbidden,

    #[error("Resource not found")]
    NotFound,

    #[error("{message}")]
    Validation {
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("Server error (HTTP {0})")]
    Server(u16),

    #[error("Unexpected response from server (HTTP {0})")]
    Unexpected(u16),

    #[error("Invalid response from server: {0}")]
    InvalidJson(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}

/// Failure of a store operation (create/update/delete/fetch).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// The submitted draft is missing required fields or holds invalid
    /// values. No request was issued.
    #[error("Please fill in the required fields: {}", .fields.join(", "))]
    Invalid { fields: Vec<String> },

    #[error("Invalid form payload: {0}")]
    Payload(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Failure building a reporting period from the filter inputs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("A custom period needs both a start date and an end date")]
    MissingBound,

    #[error("Start date {start} is after end date {end}")]
    Inverted { start: String, end: String },

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Unknown period: {0}")]
    UnknownPreset(String),
}

/// Failure of a report operation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReportError {
    #[error(transparent)]
    Period(#[from] PeriodError),

    #[error(transparent)]
    Api(#[from] ApiError),
}
