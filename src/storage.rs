//! Session token and backend URL storage in the OS credential store.
//!
//! Windows Credential Manager, macOS Keychain, and the Secret Service API on
//! Linux, all through the `keyring` crate. Nothing else is persisted locally.

use keyring::Entry;
use tracing::{info, warn};

const SERVICE_NAME: &str = "crate-desk";

pub const KEY_BACKEND_URL: &str = "backend_url";
pub const KEY_SESSION_TOKEN: &str = "session_token";

const ALL_KEYS: &[&str] = &[KEY_BACKEND_URL, KEY_SESSION_TOKEN];

/// Retrieve a single credential. Returns `None` when the entry does not exist,
/// is blank, or the platform store cannot be read.
pub fn get_credential(key: &str) -> Option<String> {
    let entry = match Entry::new(SERVICE_NAME, key) {
        Ok(e) => e,
        Err(e) => {
            warn!(key, error = %e, "keyring: failed to create entry");
            return None;
        }
    };
    match entry.get_password() {
        Ok(pw) if pw.trim().is_empty() => None,
        Ok(pw) => Some(pw),
        Err(keyring::Error::NoEntry) => None,
        Err(e) => {
            warn!(key, error = %e, "keyring: failed to read credential");
            None
        }
    }
}

pub fn set_credential(key: &str, value: &str) -> Result<(), String> {
    let entry = Entry::new(SERVICE_NAME, key).map_err(|e| e.to_string())?;
    entry.set_password(value).map_err(|e| e.to_string())
}

/// Silently succeeds if the entry does not exist.
pub fn delete_credential(key: &str) -> Result<(), String> {
    let entry = Entry::new(SERVICE_NAME, key).map_err(|e| e.to_string())?;
    match entry.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.to_string()),
    }
}

/// Where the session token is persisted.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Option<String>;
    fn save(&self, token: &str) -> Result<(), String>;
    fn clear(&self) -> Result<(), String>;
}

/// The OS credential store entry used by the running app.
pub struct KeyringTokens;

impl TokenStore for KeyringTokens {
    fn load(&self) -> Option<String> {
        get_credential(KEY_SESSION_TOKEN)
    }

    fn save(&self, token: &str) -> Result<(), String> {
        set_credential(KEY_SESSION_TOKEN, token)
    }

    fn clear(&self) -> Result<(), String> {
        delete_credential(KEY_SESSION_TOKEN)
    }
}

pub fn has_session_token() -> bool {
    get_credential(KEY_SESSION_TOKEN).is_some()
}

/// Forget everything (sign out and drop the stored backend URL).
pub fn clear_all() -> Result<(), String> {
    info!("clearing stored credentials");
    for key in ALL_KEYS {
        delete_credential(key)?;
    }
    Ok(())
}
