//! Runtime configuration.
//!
//! Resolution order for every value: environment variable, then the OS
//! credential store (backend URL only), then the built-in default.

use anyhow::{bail, Context};
use std::time::Duration;

use crate::api::normalize_backend_url;
use crate::storage;

pub const ENV_BACKEND_URL: &str = "CRATE_DESK_BACKEND_URL";
pub const ENV_REQUEST_TIMEOUT: &str = "CRATE_DESK_REQUEST_TIMEOUT_SECS";

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_LOG_FILTER: &str = "info,crate_desk_lib=debug";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub backend_url: String,
    pub request_timeout: Duration,
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl AppConfig {
    /// Load from the environment and the credential store.
    pub fn load() -> anyhow::Result<Self> {
        Self::from_sources(|key| std::env::var(key).ok(), || {
            storage::get_credential(storage::KEY_BACKEND_URL)
        })
    }

    fn from_sources(
        env: impl Fn(&str) -> Option<String>,
        stored_backend_url: impl FnOnce() -> Option<String>,
    ) -> anyhow::Result<Self> {
        let mut config = Self::default();

        let backend_url = env(ENV_BACKEND_URL)
            .filter(|v| !v.trim().is_empty())
            .or_else(stored_backend_url)
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
        config.backend_url = normalize_backend_url(&backend_url);
        if config.backend_url.is_empty() {
            bail!("backend URL resolved to an empty value");
        }

        if let Some(raw) = env(ENV_REQUEST_TIMEOUT).filter(|v| !v.trim().is_empty()) {
            let secs: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_REQUEST_TIMEOUT} must be a number of seconds"))?;
            if secs == 0 {
                bail!("{ENV_REQUEST_TIMEOUT} must be greater than zero");
            }
            config.request_timeout = Duration::from_secs(secs);
        }

        if let Some(filter) = env("RUST_LOG").filter(|v| !v.trim().is_empty()) {
            config.log_filter = filter;
        }

        Ok(config)
    }
}
