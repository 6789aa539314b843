//! Events pushed from the Rust side to the webview.
//!
//! Stores never talk to Tauri directly; they emit through an [`EventSink`],
//! which is the `AppHandle` in the running app and a recorder in tests.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tauri::Emitter;
use tracing::warn;
use uuid::Uuid;

pub const EVENT_NOTIFICATION: &str = "notification";
pub const EVENT_STORE_CHANGED: &str = "store_changed";
pub const EVENT_REPORT_CHANGED: &str = "report_changed";
pub const EVENT_AUTH_REQUIRED: &str = "auth_required";
pub const EVENT_SESSION_CHANGED: &str = "session_changed";

pub trait EventSink: Send + Sync {
    fn emit_json(&self, event: &str, payload: Value);
}

impl EventSink for tauri::AppHandle {
    fn emit_json(&self, event: &str, payload: Value) {
        if let Err(e) = self.emit(event, payload) {
            warn!(event, error = %e, "failed to emit event to webview");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Error,
}

/// A transient toast shown by the frontend.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub level: NotificationLevel,
    pub message: String,
    pub created_at: String,
}

impl Notification {
    fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            level,
            message: message.into(),
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

fn notify(sink: &dyn EventSink, notification: Notification) {
    match serde_json::to_value(&notification) {
        Ok(payload) => sink.emit_json(EVENT_NOTIFICATION, payload),
        Err(e) => warn!(error = %e, "failed to serialize notification"),
    }
}

pub fn notify_success(sink: &dyn EventSink, message: impl Into<String>) {
    notify(sink, Notification::new(NotificationLevel::Success, message));
}

pub fn notify_error(sink: &dyn EventSink, message: impl Into<String>) {
    notify(sink, Notification::new(NotificationLevel::Error, message));
}

/// Ask the frontend to route to the login screen.
pub fn auth_required(sink: &dyn EventSink, reason: &str, source: &str) {
    sink.emit_json(
        EVENT_AUTH_REQUIRED,
        serde_json::json!({
            "reason": reason,
            "source": source,
            "timestamp": Utc::now().to_rfc3339(),
        }),
    );
}
