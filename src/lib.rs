//! Crate Desk - Tauri v2 Backend
//!
//! This module registers all IPC command handlers that the React frontend
//! calls via `@tauri-apps/api/core::invoke()`. Every record screen goes
//! through the generic `records_*` commands; reports, session and settings
//! have their own.

use tauri::Manager;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod commands;
mod config;
mod diagnostics;
mod error;
mod events;
mod models;
mod period;
mod reports;
mod session;
mod storage;
mod store;

/// First non-blank string found under any of `keys`.
pub(crate) fn value_str(v: &serde_json::Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(s) = v.get(*key).and_then(|x| x.as_str()) {
            let trimmed = s.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

fn init_tracing(log_filter: &str) {
    let env_filter = EnvFilter::try_new(log_filter)
        .unwrap_or_else(|_| EnvFilter::new(config::DEFAULT_LOG_FILTER));

    // Prune old log files before setting up the appender
    diagnostics::prune_old_logs();

    let log_dir = diagnostics::get_log_dir();
    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(&log_dir, diagnostics::LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);
    let console_layer = fmt::layer().with_target(true);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    // Dropping the guard flushes and stops the writer; it must outlive the app.
    std::mem::forget(guard);
}

pub fn run() {
    let (app_config, config_error) = match config::AppConfig::load() {
        Ok(cfg) => (cfg, None),
        Err(e) => (config::AppConfig::default(), Some(e)),
    };

    init_tracing(&app_config.log_filter);
    if let Some(e) = config_error {
        warn!(error = %format!("{e:#}"), "invalid configuration, using defaults");
    }

    info!(
        backend_url = %app_config.backend_url,
        timeout_secs = app_config.request_timeout.as_secs(),
        "Starting Crate Desk v{}",
        env!("CARGO_PKG_VERSION")
    );

    let result = tauri::Builder::default()
        .setup(move |app| {
            let backend = api::HttpBackend::new(&app_config)?;
            app.manage(backend);
            app.manage(store::Stores::new());
            app.manage(reports::ReportStore::new(period::local_today()));
            app.manage(session::SessionState::new());

            // Validate a token left over from the previous run
            let startup_app = app.handle().clone();
            tauri::async_runtime::spawn(async move {
                let backend = startup_app.state::<api::HttpBackend>();
                let session_state = startup_app.state::<session::SessionState>();
                session::restore_on_startup(
                    backend.inner(),
                    &startup_app,
                    session_state.inner(),
                    storage::has_session_token(),
                )
                .await;
            });

            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // Records
            commands::records::records_list_entities,
            commands::records::records_get_state,
            commands::records::records_fetch,
            commands::records::records_search,
            commands::records::records_create,
            commands::records::records_update,
            commands::records::records_delete,
            // Reports
            commands::reports::report_get_state,
            commands::reports::report_list_periods,
            commands::reports::report_select_period,
            commands::reports::report_apply_custom_range,
            commands::reports::report_refresh,
            // Session
            commands::session::session_login,
            commands::session::session_logout,
            commands::session::session_get_current,
            commands::session::session_validate,
            // Settings
            commands::settings::settings_get_backend_url,
            commands::settings::settings_set_backend_url,
            commands::settings::settings_test_connection,
            commands::settings::settings_clear_credentials,
            // Runtime / diagnostics
            commands::runtime::app_get_version,
            commands::runtime::diagnostics_get_about,
            commands::runtime::diagnostics_get_log_dir,
        ])
        .run(tauri::generate_context!());

    if let Err(e) = result {
        tracing::error!(error = %e, "error while running Crate Desk");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::value_str;

    #[test]
    fn value_str_skips_blank_and_missing_keys() {
        let payload = serde_json::json!({ "a": "  ", "b": 3, "c": " hit " });
        assert_eq!(value_str(&payload, &["a", "b", "c"]).as_deref(), Some("hit"));
        assert_eq!(value_str(&payload, &["missing"]), None);
    }
}
