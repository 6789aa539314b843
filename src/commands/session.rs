use serde_json::Value;

use crate::api::HttpBackend;
use crate::session::{self, Credentials, SessionState};
use crate::storage::KeyringTokens;

/// Takes the password out of the payload instead of copying it, so the only
/// copy ends up in a zeroizing buffer.
fn parse_login_payload(arg0: Option<Value>, arg1: Option<Value>) -> Result<Credentials, String> {
    match (arg0, arg1) {
        (Some(Value::Object(mut obj)), _) => {
            let email = ["email", "username", "login"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(Value::as_str).map(String::from))
                .unwrap_or_default();
            let password = match obj.remove("password") {
                Some(Value::String(password)) => password,
                _ => String::new(),
            };
            Ok(Credentials::new(email, password))
        }
        (Some(Value::String(email)), Some(Value::String(password))) => {
            Ok(Credentials::new(email, password))
        }
        _ => Err("session_login expects { email, password }".into()),
    }
}

#[tauri::command]
pub async fn session_login(
    arg0: Option<Value>,
    arg1: Option<Value>,
    backend: tauri::State<'_, HttpBackend>,
    session_state: tauri::State<'_, SessionState>,
    app: tauri::AppHandle,
) -> Result<Value, String> {
    let credentials = parse_login_payload(arg0, arg1)?;
    session::login(backend.inner(), &app, &session_state, &KeyringTokens, credentials)
        .await
        .map_err(|e| e.to_string())?;
    Ok(session_state.to_json())
}

#[tauri::command]
pub async fn session_logout(
    session_state: tauri::State<'_, SessionState>,
    app: tauri::AppHandle,
) -> Result<(), String> {
    session::logout(&app, &session_state, &KeyringTokens);
    Ok(())
}

#[tauri::command]
pub async fn session_get_current(
    session_state: tauri::State<'_, SessionState>,
) -> Result<Value, String> {
    Ok(session_state.to_json())
}

#[tauri::command]
pub async fn session_validate(
    backend: tauri::State<'_, HttpBackend>,
    session_state: tauri::State<'_, SessionState>,
    app: tauri::AppHandle,
) -> Result<Value, String> {
    session::validate(backend.inner(), &app, &session_state)
        .await
        .map_err(|e| e.to_string())?;
    Ok(session_state.to_json())
}
