//! Backend REST API client.
//!
//! Provides authenticated HTTP communication with the dashboard backend. All
//! stores talk to it through the [`Backend`] trait so they can be driven by an
//! in-process fake in tests.

use async_trait::async_trait;
use reqwest::{header, Client, Method, StatusCode};
use serde_json::Value;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::session::LOGIN_PATH;
use crate::storage;

/// Timeout used specifically for the lightweight connectivity test.
const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// URL handling
// ---------------------------------------------------------------------------

/// Normalise the backend URL:
/// - ensure a scheme is present (https, or http for localhost)
/// - strip trailing slashes
/// - strip a trailing `/api` segment
pub fn normalize_backend_url(url: &str) -> String {
    let mut url = url.trim().to_string();
    if url.is_empty() {
        return url;
    }

    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    while url.ends_with('/') {
        url.pop();
    }
    if url.ends_with("/api") {
        url.truncate(url.len() - 4);
    }
    while url.ends_with('/') {
        url.pop();
    }

    url
}

/// Reject anything that is not a relative `/api/...` path.
pub(crate) fn validate_api_path(path: &str) -> Result<(), ApiError> {
    if path.trim().is_empty() {
        return Err(ApiError::InvalidRequest("missing API path".into()));
    }
    if path.contains("..") {
        return Err(ApiError::InvalidRequest(format!("invalid API path {path}")));
    }
    if path.starts_with("http://") || path.starts_with("https://") {
        return Err(ApiError::InvalidRequest(
            "absolute URLs are not allowed".into(),
        ));
    }
    if !path.starts_with("/api/") {
        return Err(ApiError::InvalidRequest(format!(
            "only /api/* paths are allowed, got {path}"
        )));
    }
    Ok(())
}

/// Append `params` to `path` as a query string. Empty values are skipped.
pub(crate) fn with_query(path: &str, params: &[(&str, String)]) -> String {
    fn enc(s: &str) -> String {
        s.replace('%', "%25")
            .replace('&', "%26")
            .replace('=', "%3D")
            .replace(' ', "%20")
            .replace('+', "%2B")
            .replace('?', "%3F")
            .replace('#', "%23")
    }
    let query: Vec<String> = params
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{}={}", enc(k), enc(v)))
        .collect();
    if query.is_empty() {
        return path.to_string();
    }
    format!("{path}?{}", query.join("&"))
}

/// Backends wrap payloads inconsistently: `[...]`, `{"data": [...]}` or
/// `{"data": {...}}`. Peel a single `data` envelope when present.
pub(crate) fn unwrap_data(value: Value) -> Value {
    match value {
        Value::Object(mut obj) if obj.contains_key("data") => {
            obj.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn friendly_error(url: &str, err: &reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::Timeout(url.to_string());
    }
    if err.is_connect() {
        return ApiError::Network(url.to_string());
    }
    if err.is_builder() {
        return ApiError::NotConfigured(format!("invalid backend URL {url}"));
    }
    ApiError::Network(format!("{url} ({err})"))
}

/// Map a non-success response to an [`ApiError`], keeping the backend's own
/// message and validation details when it sent any.
pub(crate) fn status_error(status: StatusCode, body_text: &str) -> ApiError {
    let json = serde_json::from_str::<Value>(body_text).ok();
    let message = json.as_ref().and_then(|j| {
        j.get("message")
            .or_else(|| j.get("error"))
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    });
    let details = json
        .as_ref()
        .and_then(|j| j.get("details").or_else(|| j.get("errors")).cloned());

    match status.as_u16() {
        401 => ApiError::Unauthorized,
        403 => ApiError::Forbidden,
        404 => ApiError::NotFound,
        400 | 409 | 422 => ApiError::Validation {
            message: message.unwrap_or_else(|| "The server rejected the request".to_string()),
            details,
        },
        s if s >= 500 => ApiError::Server(s),
        s => ApiError::Unexpected(s),
    }
}

// ---------------------------------------------------------------------------
// Backend seam
// ---------------------------------------------------------------------------

/// Anything able to answer a REST call with a JSON body.
#[async_trait]
pub trait Backend: Send + Sync {
    /// `path` includes the leading slash and any query string, e.g.
    /// `/api/crates` or `/api/reports/financial?startDate=...`.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ApiError>;
}

/// Production backend over `reqwest`.
pub struct HttpBackend {
    client: Client,
    base_url: RwLock<String>,
}

impl HttpBackend {
    pub fn new(config: &AppConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::NotConfigured(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: RwLock::new(normalize_backend_url(&config.backend_url)),
        })
    }

    pub fn base_url(&self) -> String {
        self.base_url
            .read()
            .map(|url| url.clone())
            .unwrap_or_default()
    }

    /// Point the client at another backend. Returns the normalised URL.
    pub fn set_base_url(&self, url: &str) -> String {
        let normalized = normalize_backend_url(url);
        if let Ok(mut current) = self.base_url.write() {
            *current = normalized.clone();
        }
        normalized
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ApiError> {
        validate_api_path(path)?;

        let base = self.base_url();
        if base.is_empty() {
            return Err(ApiError::NotConfigured("missing backend URL".into()));
        }
        let full_url = format!("{base}{path}");

        let mut req = self
            .client
            .request(method.clone(), &full_url)
            .header(header::ACCEPT, "application/json");
        if let Some(token) = storage::get_credential(storage::KEY_SESSION_TOKEN) {
            req = req.bearer_auth(token.trim());
        }
        if let Some(b) = body {
            req = req.json(&b);
        }

        debug!(method = %method, path, "backend request");
        let started = Instant::now();
        let resp = req.send().await.map_err(|e| friendly_error(&base, &e))?;
        let status = resp.status();
        let body_text = resp.text().await.unwrap_or_default();
        debug!(
            method = %method,
            path,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "backend response"
        );

        if !status.is_success() {
            if clears_session_token(status, path) {
                warn!(path, "backend rejected session token, clearing it");
                if let Err(e) = storage::delete_credential(storage::KEY_SESSION_TOKEN) {
                    warn!(error = %e, "failed to clear session token");
                }
            }
            return Err(status_error(status, &body_text));
        }

        // Null for empty 204 responses.
        if body_text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body_text).map_err(|e| ApiError::InvalidJson(e.to_string()))
    }
}

/// A 401 from the login call means wrong credentials, not an expired
/// session, so the stored token survives it.
fn clears_session_token(status: StatusCode, path: &str) -> bool {
    if status != StatusCode::UNAUTHORIZED {
        return false;
    }
    let route = path.split(['?', '#']).next().unwrap_or(path);
    route.trim_end_matches('/') != LOGIN_PATH
}

// ---------------------------------------------------------------------------
// Connectivity test
// ---------------------------------------------------------------------------

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivityResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Test connectivity to the backend with a lightweight health-check.
pub async fn test_connectivity(backend_url: &str) -> ConnectivityResult {
    let url = normalize_backend_url(backend_url);
    if url.is_empty() {
        return ConnectivityResult {
            success: false,
            latency_ms: None,
            error: Some(ApiError::NotConfigured("missing backend URL".into()).to_string()),
        };
    }
    let health_url = format!("{url}/api/health");

    let client = match Client::builder().timeout(CONNECTIVITY_TIMEOUT).build() {
        Ok(c) => c,
        Err(e) => {
            return ConnectivityResult {
                success: false,
                latency_ms: None,
                error: Some(format!("Failed to create HTTP client: {e}")),
            };
        }
    };

    let start = Instant::now();
    let resp = match client.get(&health_url).send().await {
        Ok(r) => r,
        Err(e) => {
            return ConnectivityResult {
                success: false,
                latency_ms: None,
                error: Some(friendly_error(&url, &e).to_string()),
            };
        }
    };

    let latency = start.elapsed().as_millis() as u64;
    let status = resp.status();
    if status.is_success() {
        info!(latency_ms = latency, "connectivity test passed");
        ConnectivityResult {
            success: true,
            latency_ms: Some(latency),
            error: None,
        }
    } else {
        ConnectivityResult {
            success: false,
            latency_ms: Some(latency),
            error: Some(status_error(status, "").to_string()),
        }
    }
}
