use serde_json::Value;

use crate::diagnostics;

#[tauri::command]
pub async fn app_get_version() -> Result<Value, String> {
    Ok(serde_json::json!({ "version": env!("CARGO_PKG_VERSION") }))
}

#[tauri::command]
pub async fn diagnostics_get_about() -> Result<Value, String> {
    Ok(diagnostics::get_about_info())
}

#[tauri::command]
pub async fn diagnostics_get_log_dir() -> Result<Value, String> {
    Ok(serde_json::json!({
        "logDir": diagnostics::get_log_dir().to_string_lossy(),
    }))
}
