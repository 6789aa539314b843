use serde_json::Value;
use tracing::info;

use crate::api::{self, HttpBackend};
use crate::session::{self, SessionState};
use crate::storage;

fn parse_url_payload(arg0: Option<Value>) -> Option<String> {
    match arg0? {
        Value::String(url) => Some(url.trim().to_string()).filter(|u| !u.is_empty()),
        obj @ Value::Object(_) => crate::value_str(&obj, &["backendUrl", "backend_url", "url"]),
        _ => None,
    }
}

#[tauri::command]
pub async fn settings_get_backend_url(
    backend: tauri::State<'_, HttpBackend>,
) -> Result<Value, String> {
    Ok(serde_json::json!({ "backendUrl": backend.base_url() }))
}

/// Switching backends signs the user out: the stored token belongs to the
/// previous server.
#[tauri::command]
pub async fn settings_set_backend_url(
    arg0: Option<Value>,
    backend: tauri::State<'_, HttpBackend>,
    session_state: tauri::State<'_, SessionState>,
    app: tauri::AppHandle,
) -> Result<Value, String> {
    let raw = parse_url_payload(arg0).ok_or("Missing backend URL")?;
    let normalized = api::normalize_backend_url(&raw);
    storage::set_credential(storage::KEY_BACKEND_URL, &normalized)?;

    let previous = backend.base_url();
    backend.set_base_url(&normalized);
    info!(backend_url = %normalized, "backend URL updated");
    if previous != normalized {
        session::logout(&app, &session_state, &storage::KeyringTokens);
    }
    Ok(serde_json::json!({ "backendUrl": normalized }))
}

#[tauri::command]
pub async fn settings_test_connection(
    arg0: Option<Value>,
    backend: tauri::State<'_, HttpBackend>,
) -> Result<Value, String> {
    let url = parse_url_payload(arg0).unwrap_or_else(|| backend.base_url());
    let result = api::test_connectivity(&url).await;
    serde_json::to_value(result).map_err(|e| e.to_string())
}

/// Forget the stored token and backend URL.
#[tauri::command]
pub async fn settings_clear_credentials(
    session_state: tauri::State<'_, SessionState>,
    app: tauri::AppHandle,
) -> Result<(), String> {
    storage::clear_all()?;
    session::logout(&app, &session_state, &storage::KeyringTokens);
    Ok(())
}
