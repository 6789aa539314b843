//! Per-entity data-fetch facades.
//!
//! A [`Store`] keeps the last collection fetched from the backend for the
//! current session. Writes are confirmed by the backend first and followed by
//! a single refresh of the collection; nothing is applied optimistically.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::sync::Mutex;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::api::{unwrap_data, Backend};
use crate::error::{ApiError, StoreError};
use crate::events::{self, EventSink, EVENT_STORE_CHANGED};
use crate::models::{
    invalid_fields, parse_list, Charge, Crate, Employee, EntityKind, Product, Purchase, Resource,
    Supplier, Tournee, Truck, Waste,
};

struct StoreState<R> {
    items: Vec<R>,
    loading: bool,
    error: Option<String>,
    last_fetched_at: Option<String>,
}

impl<R> Default for StoreState<R> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            error: None,
            last_fetched_at: None,
        }
    }
}

/// What list views render.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot<R> {
    pub entity: EntityKind,
    pub items: Vec<R>,
    pub count: usize,
    pub loading: bool,
    pub error: Option<String>,
    pub last_fetched_at: Option<String>,
}

pub struct Store<R: Resource> {
    state: Mutex<StoreState<R>>,
}

impl<R: Resource> Default for Store<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Resource> Store<R> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
        }
    }

    pub fn snapshot(&self) -> StoreSnapshot<R> {
        match self.state.lock() {
            Ok(state) => snapshot_of(&state),
            Err(poisoned) => snapshot_of(&poisoned.into_inner()),
        }
    }

    pub fn items(&self) -> Vec<R> {
        self.snapshot().items
    }

    /// Case-insensitive filter over the cached collection.
    pub fn search(&self, query: &str) -> Vec<R> {
        let needle = query.trim().to_lowercase();
        let items = self.items();
        if needle.is_empty() {
            return items;
        }
        items
            .into_iter()
            .filter(|item| item.search_text().contains(&needle))
            .collect()
    }

    fn update_state(&self, sink: &dyn EventSink, apply: impl FnOnce(&mut StoreState<R>)) {
        let snapshot = {
            let mut state = match self.state.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            apply(&mut state);
            snapshot_of(&state)
        };
        match serde_json::to_value(&snapshot) {
            Ok(payload) => sink.emit_json(
                EVENT_STORE_CHANGED,
                serde_json::json!({ "entity": R::KIND.key(), "state": payload }),
            ),
            Err(e) => warn!(entity = R::KIND.key(), error = %e, "failed to serialize snapshot"),
        }
    }

    /// Load the collection. On failure the previous items stay in place.
    pub async fn fetch(
        &self,
        backend: &dyn Backend,
        sink: &dyn EventSink,
    ) -> Result<Vec<R>, StoreError> {
        let kind = R::KIND;
        self.update_state(sink, |state| state.loading = true);

        let result = match backend.request(Method::GET, &kind.path(), None).await {
            Ok(body) => parse_list::<R>(body),
            Err(e) => Err(e),
        };

        match result {
            Ok(items) => {
                info!(entity = kind.key(), count = items.len(), "collection loaded");
                let fresh = items.clone();
                self.update_state(sink, move |state| {
                    state.items = fresh;
                    state.loading = false;
                    state.error = None;
                    state.last_fetched_at = Some(Utc::now().to_rfc3339());
                });
                Ok(items)
            }
            Err(e) => {
                warn!(entity = kind.key(), error = %e, "collection fetch failed");
                let message = e.to_string();
                self.update_state(sink, move |state| {
                    state.loading = false;
                    state.error = Some(message);
                });
                report_failure(sink, kind, &format!("Could not load {}", kind.key()), &e);
                Err(e.into())
            }
        }
    }

    pub async fn create(
        &self,
        backend: &dyn Backend,
        sink: &dyn EventSink,
        draft: R::Draft,
    ) -> Result<Value, StoreError> {
        let body = validated_body::<R>(&draft)?;
        self.submit(backend, sink, Method::POST, R::KIND.path(), Some(body), WriteAction::Create)
            .await
    }

    pub async fn update(
        &self,
        backend: &dyn Backend,
        sink: &dyn EventSink,
        id: &str,
        draft: R::Draft,
    ) -> Result<Value, StoreError> {
        let id = required_id(id)?;
        let body = validated_body::<R>(&draft)?;
        let path = format!("{}/{id}", R::KIND.path());
        self.submit(backend, sink, Method::PUT, path, Some(body), WriteAction::Update)
            .await
    }

    pub async fn delete(
        &self,
        backend: &dyn Backend,
        sink: &dyn EventSink,
        id: &str,
    ) -> Result<Value, StoreError> {
        let id = required_id(id)?;
        let path = format!("{}/{id}", R::KIND.path());
        self.submit(backend, sink, Method::DELETE, path, None, WriteAction::Delete)
            .await
    }

    async fn submit(
        &self,
        backend: &dyn Backend,
        sink: &dyn EventSink,
        method: Method,
        path: String,
        body: Option<Value>,
        action: WriteAction,
    ) -> Result<Value, StoreError> {
        let kind = R::KIND;
        debug!(entity = kind.key(), method = %method, path = %path, "submitting record");
        match backend.request(method, &path, body).await {
            Ok(response) => {
                info!(entity = kind.key(), action = action.verb(), "record saved");
                events::notify_success(
                    sink,
                    format!("{} {} successfully", kind.label(), action.past()),
                );
                // A failed refresh reports itself; the write already happened.
                if let Err(e) = self.fetch(backend, sink).await {
                    debug!(entity = kind.key(), error = %e, "refresh after write failed");
                }
                Ok(unwrap_data(response))
            }
            Err(e) => {
                warn!(entity = kind.key(), action = action.verb(), error = %e, "record write failed");
                let context = format!(
                    "Could not {} {}",
                    action.verb(),
                    kind.label().to_lowercase()
                );
                report_failure(sink, kind, &context, &e);
                Err(e.into())
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum WriteAction {
    Create,
    Update,
    Delete,
}

impl WriteAction {
    fn verb(self) -> &'static str {
        match self {
            WriteAction::Create => "create",
            WriteAction::Update => "update",
            WriteAction::Delete => "delete",
        }
    }

    fn past(self) -> &'static str {
        match self {
            WriteAction::Create => "created",
            WriteAction::Update => "updated",
            WriteAction::Delete => "deleted",
        }
    }
}

fn snapshot_of<R: Resource>(state: &StoreState<R>) -> StoreSnapshot<R> {
    StoreSnapshot {
        entity: R::KIND,
        items: state.items.clone(),
        count: state.items.len(),
        loading: state.loading,
        error: state.error.clone(),
        last_fetched_at: state.last_fetched_at.clone(),
    }
}

fn validated_body<R: Resource>(draft: &R::Draft) -> Result<Value, StoreError> {
    if let Err(errors) = draft.validate() {
        let fields = invalid_fields(&errors);
        debug!(entity = R::KIND.key(), ?fields, "draft rejected before submit");
        return Err(StoreError::Invalid { fields });
    }
    serde_json::to_value(draft).map_err(|e| StoreError::Payload(e.to_string()))
}

/// Ids are spliced into the request path, so anything that could change
/// the path, query or fragment is refused.
fn required_id(id: &str) -> Result<&str, StoreError> {
    let id = id.trim();
    let unsafe_char =
        |c: char| matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_whitespace() || c.is_control();
    if id.is_empty() || id.contains("..") || id.contains(unsafe_char) {
        return Err(StoreError::Invalid {
            fields: vec!["id".into()],
        });
    }
    Ok(id)
}

/// One error toast per failure, plus the login redirect on 401.
fn report_failure(sink: &dyn EventSink, kind: EntityKind, context: &str, err: &ApiError) {
    events::notify_error(sink, format!("{context}: {err}"));
    if err.is_unauthorized() {
        events::auth_required(sink, "session_expired", kind.key());
    }
}

// ---------------------------------------------------------------------------
// Type-erased access for the IPC layer
// ---------------------------------------------------------------------------

/// JSON-in/JSON-out view over a [`Store`], so commands can dispatch on an
/// [`EntityKind`] chosen at runtime.
#[async_trait]
pub trait RecordStore: Send + Sync {
    fn kind(&self) -> EntityKind;

    fn snapshot_json(&self) -> Value;

    fn search_json(&self, query: &str) -> Value;

    async fn fetch_json(
        &self,
        backend: &dyn Backend,
        sink: &dyn EventSink,
    ) -> Result<Value, StoreError>;

    async fn create_json(
        &self,
        backend: &dyn Backend,
        sink: &dyn EventSink,
        draft: Value,
    ) -> Result<Value, StoreError>;

    async fn update_json(
        &self,
        backend: &dyn Backend,
        sink: &dyn EventSink,
        id: &str,
        draft: Value,
    ) -> Result<Value, StoreError>;

    async fn delete_json(
        &self,
        backend: &dyn Backend,
        sink: &dyn EventSink,
        id: &str,
    ) -> Result<Value, StoreError>;
}

fn parse_draft<R: Resource>(draft: Value) -> Result<R::Draft, StoreError> {
    let draft = match draft {
        Value::Null => serde_json::json!({}),
        other => other,
    };
    serde_json::from_value(draft).map_err(|e| StoreError::Payload(e.to_string()))
}

#[async_trait]
impl<R: Resource> RecordStore for Store<R> {
    fn kind(&self) -> EntityKind {
        R::KIND
    }

    fn snapshot_json(&self) -> Value {
        serde_json::to_value(self.snapshot()).unwrap_or(Value::Null)
    }

    fn search_json(&self, query: &str) -> Value {
        serde_json::to_value(self.search(query)).unwrap_or_else(|_| serde_json::json!([]))
    }

    async fn fetch_json(
        &self,
        backend: &dyn Backend,
        sink: &dyn EventSink,
    ) -> Result<Value, StoreError> {
        let items = self.fetch(backend, sink).await?;
        serde_json::to_value(items).map_err(|e| StoreError::Payload(e.to_string()))
    }

    async fn create_json(
        &self,
        backend: &dyn Backend,
        sink: &dyn EventSink,
        draft: Value,
    ) -> Result<Value, StoreError> {
        let draft = parse_draft::<R>(draft)?;
        self.create(backend, sink, draft).await
    }

    async fn update_json(
        &self,
        backend: &dyn Backend,
        sink: &dyn EventSink,
        id: &str,
        draft: Value,
    ) -> Result<Value, StoreError> {
        let draft = parse_draft::<R>(draft)?;
        self.update(backend, sink, id, draft).await
    }

    async fn delete_json(
        &self,
        backend: &dyn Backend,
        sink: &dyn EventSink,
        id: &str,
    ) -> Result<Value, StoreError> {
        self.delete(backend, sink, id).await
    }
}

/// One store per entity screen, held for the whole session.
#[derive(Default)]
pub struct Stores {
    pub crates: Store<Crate>,
    pub products: Store<Product>,
    pub employees: Store<Employee>,
    pub trucks: Store<Truck>,
    pub suppliers: Store<Supplier>,
    pub purchases: Store<Purchase>,
    pub charges: Store<Charge>,
    pub wastes: Store<Waste>,
    pub tournees: Store<Tournee>,
}

impl Stores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: EntityKind) -> &dyn RecordStore {
        match kind {
            EntityKind::Crates => &self.crates,
            EntityKind::Products => &self.products,
            EntityKind::Employees => &self.employees,
            EntityKind::Trucks => &self.trucks,
            EntityKind::Suppliers => &self.suppliers,
            EntityKind::Purchases => &self.purchases,
            EntityKind::Charges => &self.charges,
            EntityKind::Wastes => &self.wastes,
            EntityKind::Tournees => &self.tournees,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::FakeBackend;
    use crate::events::testing::RecordingSink;
    use crate::events::{EVENT_AUTH_REQUIRED, EVENT_NOTIFICATION};
    use crate::models::ProductDraft;

    fn product_rows() -> Value {
        serde_json::json!([
            { "id": 1, "name": "Tomatoes", "unitPrice": 4.5, "quantity": 120 },
            { "id": 2, "name": "Red onions", "unitPrice": 3.0, "quantity": 80 }
        ])
    }

    fn valid_draft() -> ProductDraft {
        ProductDraft {
            name: Some("Peppers".into()),
            unit: Some("kg".into()),
            unit_price: Some(7.0),
            quantity: Some(40.0),
        }
    }

    #[tokio::test]
    async fn fetch_populates_items_without_notifications() {
        let backend = FakeBackend::default();
        backend.respond(Method::GET, "/api/products", Ok(product_rows()));
        let sink = RecordingSink::default();
        let store: Store<Product> = Store::new();

        let items = store.fetch(&backend, &sink).await.expect("fetch succeeds");

        assert_eq!(items.len(), 2);
        let snapshot = store.snapshot();
        assert_eq!(snapshot.count, 2);
        assert!(!snapshot.loading);
        assert!(snapshot.error.is_none());
        assert!(snapshot.last_fetched_at.is_some());
        assert!(sink.named(EVENT_NOTIFICATION).is_empty());
        // loading on, then loaded
        assert_eq!(sink.named(EVENT_STORE_CHANGED).len(), 2);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_items_and_notifies_once() {
        let backend = FakeBackend::default();
        backend.respond(Method::GET, "/api/products", Ok(product_rows()));
        backend.respond(Method::GET, "/api/products", Err(ApiError::Server(503)));
        let sink = RecordingSink::default();
        let store: Store<Product> = Store::new();

        store.fetch(&backend, &sink).await.expect("first fetch succeeds");
        let before = store.items();
        let err = store
            .fetch(&backend, &sink)
            .await
            .expect_err("second fetch fails");

        assert_eq!(err, StoreError::Api(ApiError::Server(503)));
        assert_eq!(store.items(), before);
        assert_eq!(
            store.snapshot().error.as_deref(),
            Some("Server error (HTTP 503)")
        );
        let errors = sink.notifications("error");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Could not load products"));
        assert!(sink.named(EVENT_AUTH_REQUIRED).is_empty());
    }

    #[tokio::test]
    async fn create_posts_once_then_refreshes_and_notifies_success() {
        let backend = FakeBackend::default();
        backend.respond(
            Method::POST,
            "/api/products",
            Ok(serde_json::json!({ "data": { "id": 3, "name": "Peppers" } })),
        );
        backend.respond(Method::GET, "/api/products", Ok(product_rows()));
        let sink = RecordingSink::default();
        let store: Store<Product> = Store::new();

        let created = store
            .create(&backend, &sink, valid_draft())
            .await
            .expect("create succeeds");

        assert_eq!(created.get("id"), Some(&serde_json::json!(3)));
        assert_eq!(backend.count(Method::POST, "/api/products"), 1);
        assert_eq!(backend.count(Method::GET, "/api/products"), 1);
        assert_eq!(
            sink.notifications("success"),
            vec!["Product created successfully"]
        );
        assert!(sink.notifications("error").is_empty());

        let (_, _, body) = &backend.calls()[0];
        assert_eq!(
            body.as_ref().and_then(|b| b.get("unitPrice")),
            Some(&serde_json::json!(7.0))
        );
    }

    #[tokio::test]
    async fn invalid_draft_never_reaches_the_backend() {
        let backend = FakeBackend::default();
        let sink = RecordingSink::default();
        let store: Store<Product> = Store::new();

        let draft = ProductDraft {
            name: None,
            ..valid_draft()
        };
        let err = store
            .create(&backend, &sink, draft)
            .await
            .expect_err("missing name must be rejected");

        assert_eq!(
            err,
            StoreError::Invalid {
                fields: vec!["name".into()]
            }
        );
        assert!(backend.calls().is_empty());
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn failed_create_notifies_error_and_skips_refresh() {
        let backend = FakeBackend::default();
        backend.respond(
            Method::POST,
            "/api/products",
            Err(ApiError::Validation {
                message: "Product already exists".into(),
                details: None,
            }),
        );
        let sink = RecordingSink::default();
        let store: Store<Product> = Store::new();

        store
            .create(&backend, &sink, valid_draft())
            .await
            .expect_err("backend rejects");

        assert_eq!(backend.count(Method::GET, "/api/products"), 0);
        assert_eq!(
            sink.notifications("error"),
            vec!["Could not create product: Product already exists"]
        );
        assert!(sink.notifications("success").is_empty());
    }

    #[tokio::test]
    async fn update_and_delete_target_the_record_path() {
        let backend = FakeBackend::default();
        backend.respond(Method::PUT, "/api/products/2", Ok(serde_json::json!({ "id": 2 })));
        backend.respond(Method::DELETE, "/api/products/2", Ok(Value::Null));
        backend.respond(Method::GET, "/api/products", Ok(product_rows()));
        let sink = RecordingSink::default();
        let store: Store<Product> = Store::new();

        store
            .update(&backend, &sink, " 2 ", valid_draft())
            .await
            .expect("update succeeds");
        store
            .delete(&backend, &sink, "2")
            .await
            .expect("delete succeeds");

        assert_eq!(backend.count(Method::PUT, "/api/products/2"), 1);
        assert_eq!(backend.count(Method::DELETE, "/api/products/2"), 1);
        assert_eq!(backend.count(Method::GET, "/api/products"), 2);
        assert_eq!(
            sink.notifications("success"),
            vec![
                "Product updated successfully",
                "Product deleted successfully"
            ]
        );
    }

    #[tokio::test]
    async fn ids_that_would_alter_the_path_are_rejected_locally() {
        let backend = FakeBackend::default();
        let sink = RecordingSink::default();
        let store: Store<Product> = Store::new();

        for id in [
            "", "  ", "../users", "1/2", "1?force=true", "1#x", "1 2", "1%2F2", "1\\2", "1\t2",
        ] {
            let err = store
                .delete(&backend, &sink, id)
                .await
                .expect_err("bad id must be rejected");
            assert!(matches!(err, StoreError::Invalid { .. }), "{id:?}");
            let err = store
                .update(&backend, &sink, id, valid_draft())
                .await
                .expect_err("bad id must be rejected");
            assert!(matches!(err, StoreError::Invalid { .. }), "{id:?}");
        }
        assert!(backend.calls().is_empty());
        assert_eq!(required_id(" CR-12 "), Ok("CR-12"));
    }

    #[tokio::test]
    async fn tournee_rows_reach_the_list_view_in_visiting_order() {
        let backend = FakeBackend::default();
        backend.respond(
            Method::GET,
            &EntityKind::Tournees.path(),
            Ok(serde_json::json!([{
                "id": 4,
                "status": "planned",
                "stops": [{ "name": "Agadir", "order": 2 }, { "name": "Inezgane", "order": 1 }]
            }])),
        );
        let sink = RecordingSink::default();
        let stores = Stores::new();
        let records = stores.get(EntityKind::Tournees);

        let rows = records.fetch_json(&backend, &sink).await.expect("fetch succeeds");

        assert_eq!(rows[0]["nextStatus"], "active");
        assert_eq!(rows[0]["stops"][0]["name"], "Inezgane");
        let snapshot = records.snapshot_json();
        assert_eq!(snapshot["items"][0]["nextStatus"], "active");
        assert_eq!(records.search_json("agadir")[0]["id"], "4");
    }

    #[tokio::test]
    async fn unauthorized_fetch_requests_login() {
        let backend = FakeBackend::default();
        backend.respond(Method::GET, "/api/crates", Err(ApiError::Unauthorized));
        let sink = RecordingSink::default();
        let store: Store<Crate> = Store::new();

        store.fetch(&backend, &sink).await.expect_err("401");

        assert_eq!(sink.notifications("error").len(), 1);
        let auth = sink.named(EVENT_AUTH_REQUIRED);
        assert_eq!(auth.len(), 1);
        assert_eq!(auth[0].get("source"), Some(&serde_json::json!("crates")));
    }

    #[tokio::test]
    async fn search_filters_cached_items() {
        let backend = FakeBackend::default();
        backend.respond(Method::GET, "/api/products", Ok(product_rows()));
        let sink = RecordingSink::default();
        let store: Store<Product> = Store::new();
        store.fetch(&backend, &sink).await.expect("fetch succeeds");

        let hits = store.search("ONION");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Red onions");
        assert_eq!(store.search("  ").len(), 2);
    }

    #[tokio::test]
    async fn record_store_dispatches_json_drafts() {
        let backend = FakeBackend::default();
        backend.respond(Method::POST, "/api/charges", Ok(serde_json::json!({ "id": 10 })));
        backend.respond(Method::GET, "/api/charges", Ok(serde_json::json!([])));
        let sink = RecordingSink::default();
        let stores = Stores::new();
        let charges = stores.get(EntityKind::Charges);
        assert_eq!(charges.kind(), EntityKind::Charges);

        charges
            .create_json(
                &backend,
                &sink,
                serde_json::json!({ "label": "Gasoil", "amount": "450", "date": "2024-03-01" }),
            )
            .await
            .expect("json create succeeds");

        let err = charges
            .create_json(&backend, &sink, serde_json::json!({ "label": "Rent" }))
            .await
            .expect_err("amount and date missing");
        assert_eq!(
            err,
            StoreError::Invalid {
                fields: vec!["amount".into(), "date".into()]
            }
        );

        let err = charges
            .create_json(&backend, &sink, serde_json::json!(["not", "an", "object"]))
            .await
            .expect_err("arrays are not drafts");
        assert!(matches!(err, StoreError::Payload(_)));
        assert_eq!(backend.count(Method::POST, "/api/charges"), 1);
    }
}
