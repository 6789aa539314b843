//! Backend session: email/password login against the dashboard API.
//!
//! The bearer token lives behind a [`TokenStore`] (the OS credential store in
//! the app); the signed-in user is kept in memory only and re-validated at
//! startup. A token is only kept once the user it belongs to is known.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::api::{unwrap_data, Backend};
use crate::error::ApiError;
use crate::events::{self, EventSink, EVENT_SESSION_CHANGED};
use crate::models::lenient;
use crate::storage::TokenStore;

pub const LOGIN_PATH: &str = "/api/auth/login";
pub const ME_PATH: &str = "/api/auth/me";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    #[serde(deserialize_with = "lenient::id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub email: String,
    #[serde(default, alias = "fullName", alias = "username", deserialize_with = "lenient::opt_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub role: Option<String>,
}

/// Login form input. The password buffer is wiped on drop.
pub struct Credentials {
    pub email: String,
    pub password: Zeroizing<String>,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into().trim().to_string(),
            password: Zeroizing::new(password.into()),
        }
    }

    fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.email.is_empty() {
            missing.push("email");
        }
        if self.password.is_empty() {
            missing.push("password");
        }
        missing
    }
}

/// Tauri managed state for the signed-in user.
#[derive(Default)]
pub struct SessionState {
    user: Mutex<Option<SessionUser>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<SessionUser> {
        match self.user.lock() {
            Ok(user) => user.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn to_json(&self) -> Value {
        session_json(self.current().as_ref())
    }

    fn set(&self, sink: &dyn EventSink, user: Option<SessionUser>) {
        let payload = session_json(user.as_ref());
        match self.user.lock() {
            Ok(mut current) => *current = user,
            Err(poisoned) => *poisoned.into_inner() = user,
        }
        sink.emit_json(EVENT_SESSION_CHANGED, payload);
    }
}

fn session_json(user: Option<&SessionUser>) -> Value {
    serde_json::json!({
        "authenticated": user.is_some(),
        "user": user,
    })
}

fn parse_user(value: &Value) -> Option<SessionUser> {
    let candidate = value.get("user").unwrap_or(value);
    serde_json::from_value(candidate.clone()).ok()
}

/// Pull the bearer token (and the user, when sent along) out of a login
/// response. Accepts `token`, `accessToken` and `access_token`.
pub fn parse_login_response(value: Value) -> Result<(Zeroizing<String>, Option<SessionUser>), ApiError> {
    let body = unwrap_data(value);
    let token = ["token", "accessToken", "access_token"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::InvalidJson("login response has no token".into()))?;
    Ok((Zeroizing::new(token.to_string()), parse_user(&body)))
}

pub async fn login(
    backend: &dyn Backend,
    sink: &dyn EventSink,
    state: &SessionState,
    tokens: &dyn TokenStore,
    credentials: Credentials,
) -> Result<SessionUser, ApiError> {
    let missing = credentials.missing_fields();
    if !missing.is_empty() {
        return Err(ApiError::Validation {
            message: format!("Please fill in the required fields: {}", missing.join(", ")),
            details: None,
        });
    }

    let body = serde_json::json!({
        "email": credentials.email,
        "password": credentials.password.as_str(),
    });
    let response = match backend.request(Method::POST, LOGIN_PATH, Some(body)).await {
        Ok(response) => response,
        Err(ApiError::Unauthorized) => {
            info!(email = %credentials.email, "login rejected");
            return Err(ApiError::Validation {
                message: "Invalid email or password".into(),
                details: None,
            });
        }
        Err(e) => {
            warn!(error = %e, "login request failed");
            return Err(e);
        }
    };

    let (token, user) = parse_login_response(response)?;
    tokens
        .save(&token)
        .map_err(|e| ApiError::NotConfigured(format!("failed to store session token: {e}")))?;

    // `/me` authenticates with the stored token; drop it again if that fails.
    let user = match user {
        Some(user) => user,
        None => match fetch_current_user(backend).await {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "signed-in user could not be resolved, discarding token");
                if let Err(clear_err) = tokens.clear() {
                    warn!(error = %clear_err, "failed to discard session token");
                }
                return Err(e);
            }
        },
    };
    info!(user_id = %user.id, "signed in");
    state.set(sink, Some(user.clone()));
    Ok(user)
}

pub fn logout(sink: &dyn EventSink, state: &SessionState, tokens: &dyn TokenStore) {
    if let Err(e) = tokens.clear() {
        warn!(error = %e, "failed to delete session token");
    }
    state.set(sink, None);
    events::auth_required(sink, "logout", "session");
    info!("signed out");
}

async fn fetch_current_user(backend: &dyn Backend) -> Result<SessionUser, ApiError> {
    let body = unwrap_data(backend.request(Method::GET, ME_PATH, None).await?);
    parse_user(&body).ok_or_else(|| ApiError::InvalidJson("current user payload".into()))
}

/// Ask the backend who the stored token belongs to.
pub async fn validate(
    backend: &dyn Backend,
    sink: &dyn EventSink,
    state: &SessionState,
) -> Result<SessionUser, ApiError> {
    match fetch_current_user(backend).await {
        Ok(user) => {
            debug!(user_id = %user.id, "session valid");
            state.set(sink, Some(user.clone()));
            Ok(user)
        }
        Err(e) if e.is_unauthorized() => {
            state.set(sink, None);
            events::auth_required(sink, "session_expired", "session");
            Err(e)
        }
        Err(e) => Err(e),
    }
}

/// Re-validate a token left over from a previous run.
pub async fn restore_on_startup(
    backend: &dyn Backend,
    sink: &dyn EventSink,
    state: &SessionState,
    has_token: bool,
) {
    if !has_token {
        debug!("no stored session token");
        events::auth_required(sink, "no_session", "startup");
        return;
    }
    match validate(backend, sink, state).await {
        Ok(user) => info!(user_id = %user.id, "restored previous session"),
        Err(e) => warn!(error = %e, "stored session could not be restored"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::FakeBackend;
    use crate::events::testing::RecordingSink;
    use crate::events::EVENT_AUTH_REQUIRED;
    use crate::storage::testing::MemoryTokens;

    #[test]
    fn login_response_accepts_token_aliases() {
        let (token, user) = parse_login_response(serde_json::json!({
            "data": {
                "accessToken": " abc.def ",
                "user": { "id": 3, "email": "admin@cratedesk.ma", "fullName": "Admin" }
            }
        }))
        .expect("token present");
        assert_eq!(token.as_str(), "abc.def");
        let user = user.expect("user present");
        assert_eq!(user.id, "3");
        assert_eq!(user.name.as_deref(), Some("Admin"));

        let (token, user) =
            parse_login_response(serde_json::json!({ "token": "t-1" })).expect("token present");
        assert_eq!(token.as_str(), "t-1");
        assert!(user.is_none());

        assert!(parse_login_response(serde_json::json!({ "token": "  " })).is_err());
    }

    #[test]
    fn credentials_report_missing_fields() {
        assert_eq!(
            Credentials::new("  ", "").missing_fields(),
            vec!["email", "password"]
        );
        assert!(Credentials::new("a@b.ma", "secret").missing_fields().is_empty());
    }

    #[tokio::test]
    async fn blank_credentials_never_reach_the_backend() {
        let backend = FakeBackend::default();
        let sink = RecordingSink::default();
        let state = SessionState::new();
        let tokens = MemoryTokens::default();

        let err = login(&backend, &sink, &state, &tokens, Credentials::new("a@b.ma", ""))
            .await
            .expect_err("password missing");
        assert_eq!(err.to_string(), "Please fill in the required fields: password");
        assert!(backend.calls().is_empty());
        assert!(tokens.load().is_none());
    }

    #[tokio::test]
    async fn rejected_login_reads_as_bad_credentials() {
        let backend = FakeBackend::default();
        backend.respond(Method::POST, LOGIN_PATH, Err(ApiError::Unauthorized));
        let sink = RecordingSink::default();
        let state = SessionState::new();
        let tokens = MemoryTokens::default();

        let err = login(&backend, &sink, &state, &tokens, Credentials::new("a@b.ma", "nope"))
            .await
            .expect_err("401");
        assert_eq!(err.to_string(), "Invalid email or password");
        assert!(state.current().is_none());
        assert!(tokens.load().is_none());
        assert!(sink.named(EVENT_AUTH_REQUIRED).is_empty());
    }

    #[tokio::test]
    async fn login_stores_token_and_user_from_the_response() {
        let backend = FakeBackend::default();
        backend.respond(
            Method::POST,
            LOGIN_PATH,
            Ok(serde_json::json!({
                "token": "tok-1",
                "user": { "id": 7, "email": "admin@cratedesk.ma" }
            })),
        );
        let sink = RecordingSink::default();
        let state = SessionState::new();
        let tokens = MemoryTokens::default();

        let credentials = Credentials::new("admin@cratedesk.ma", "pw");
        let user = login(&backend, &sink, &state, &tokens, credentials)
            .await
            .expect("login succeeds");

        assert_eq!(user.id, "7");
        assert_eq!(tokens.load().as_deref(), Some("tok-1"));
        assert_eq!(state.current(), Some(user));
        assert_eq!(backend.count(Method::GET, ME_PATH), 0);
        assert_eq!(sink.named(EVENT_SESSION_CHANGED).len(), 1);
    }

    #[tokio::test]
    async fn login_without_user_resolves_it_through_me() {
        let backend = FakeBackend::default();
        backend.respond(Method::POST, LOGIN_PATH, Ok(serde_json::json!({ "token": "tok-2" })));
        backend.respond(
            Method::GET,
            ME_PATH,
            Ok(serde_json::json!({ "data": { "id": "u9", "email": "ops@cratedesk.ma" } })),
        );
        let sink = RecordingSink::default();
        let state = SessionState::new();
        let tokens = MemoryTokens::default();

        let credentials = Credentials::new("ops@cratedesk.ma", "pw");
        let user = login(&backend, &sink, &state, &tokens, credentials)
            .await
            .expect("login succeeds");

        assert_eq!(user.id, "u9");
        assert_eq!(tokens.load().as_deref(), Some("tok-2"));
        assert_eq!(backend.count(Method::GET, ME_PATH), 1);
    }

    #[tokio::test]
    async fn failed_user_lookup_leaves_no_token_behind() {
        let backend = FakeBackend::default();
        backend.respond(Method::POST, LOGIN_PATH, Ok(serde_json::json!({ "token": "tok-3" })));
        backend.respond(Method::GET, ME_PATH, Err(ApiError::Server(500)));
        let sink = RecordingSink::default();
        let state = SessionState::new();
        let tokens = MemoryTokens::default();

        let credentials = Credentials::new("ops@cratedesk.ma", "pw");
        let err = login(&backend, &sink, &state, &tokens, credentials)
            .await
            .expect_err("me fails");

        assert_eq!(err, ApiError::Server(500));
        assert!(tokens.load().is_none());
        assert!(state.current().is_none());
        assert!(sink.named(EVENT_SESSION_CHANGED).is_empty());
    }

    #[tokio::test]
    async fn unwritable_keyring_fails_the_login() {
        let backend = FakeBackend::default();
        backend.respond(
            Method::POST,
            LOGIN_PATH,
            Ok(serde_json::json!({ "token": "tok-4", "user": { "id": 1 } })),
        );
        let sink = RecordingSink::default();
        let state = SessionState::new();
        let tokens = MemoryTokens::failing();

        login(&backend, &sink, &state, &tokens, Credentials::new("a@b.ma", "pw"))
            .await
            .expect_err("token cannot be stored");
        assert!(state.current().is_none());
    }

    #[test]
    fn logout_clears_token_and_user() {
        let sink = RecordingSink::default();
        let state = SessionState::new();
        let tokens = MemoryTokens::holding("tok-5");

        logout(&sink, &state, &tokens);

        assert!(tokens.load().is_none());
        assert!(state.current().is_none());
        let auth = sink.named(EVENT_AUTH_REQUIRED);
        assert_eq!(auth.len(), 1);
        assert_eq!(auth[0]["reason"], serde_json::json!("logout"));
    }

    #[tokio::test]
    async fn validate_sets_and_clears_the_user() {
        let backend = FakeBackend::default();
        backend.respond(
            Method::GET,
            ME_PATH,
            Ok(serde_json::json!({ "user": { "id": "u1", "email": "ops@cratedesk.ma" } })),
        );
        backend.respond(Method::GET, ME_PATH, Err(ApiError::Unauthorized));
        let sink = RecordingSink::default();
        let state = SessionState::new();

        let user = validate(&backend, &sink, &state).await.expect("valid token");
        assert_eq!(user.email, "ops@cratedesk.ma");
        assert_eq!(state.to_json()["authenticated"], serde_json::json!(true));

        validate(&backend, &sink, &state).await.expect_err("expired");
        assert!(state.current().is_none());
        let auth = sink.named(EVENT_AUTH_REQUIRED);
        assert_eq!(auth.len(), 1);
        assert_eq!(auth[0]["reason"], serde_json::json!("session_expired"));
        assert_eq!(sink.named(EVENT_SESSION_CHANGED).len(), 2);
    }

    #[tokio::test]
    async fn startup_without_token_asks_for_login() {
        let backend = FakeBackend::default();
        let sink = RecordingSink::default();
        let state = SessionState::new();

        restore_on_startup(&backend, &sink, &state, false).await;

        assert!(backend.calls().is_empty());
        let auth = sink.named(EVENT_AUTH_REQUIRED);
        assert_eq!(auth.len(), 1);
        assert_eq!(auth[0]["reason"], serde_json::json!("no_session"));
    }
}
