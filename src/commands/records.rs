use serde_json::Value;

use crate::api::HttpBackend;
use crate::models::EntityKind;
use crate::store::Stores;

#[derive(Debug, PartialEq)]
struct RecordPayload {
    kind: EntityKind,
    id: Option<String>,
    draft: Value,
    query: String,
}

fn id_from(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_kind(raw: &str) -> Result<EntityKind, String> {
    EntityKind::parse(raw).ok_or_else(|| format!("Unknown entity: {}", raw.trim()))
}

/// Accepts `{ entity, id?, data?, query? }`, or `(entity, data)` /
/// `(entity, id)` as two positional arguments.
fn parse_record_payload(arg0: Option<Value>, arg1: Option<Value>) -> Result<RecordPayload, String> {
    match arg0 {
        Some(Value::String(entity)) => {
            let kind = parse_kind(&entity)?;
            let (id, draft, query) = match arg1 {
                Some(Value::Object(obj)) => {
                    let id = ["id", "recordId"]
                        .iter()
                        .find_map(|k| obj.get(*k).and_then(id_from));
                    (id, Value::Object(obj), String::new())
                }
                Some(other) => {
                    let query = other.as_str().unwrap_or_default().trim().to_string();
                    (id_from(&other), Value::Null, query)
                }
                None => (None, Value::Null, String::new()),
            };
            Ok(RecordPayload {
                kind,
                id,
                draft,
                query,
            })
        }
        Some(obj @ Value::Object(_)) => {
            let entity = crate::value_str(&obj, &["entity", "kind", "type", "resource"])
                .ok_or("Missing entity")?;
            let kind = parse_kind(&entity)?;
            let id = ["id", "recordId"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(id_from));
            let query = crate::value_str(&obj, &["query", "q", "search"]).unwrap_or_default();
            let draft = ["data", "draft", "payload", "record"]
                .iter()
                .find_map(|k| obj.get(*k).cloned())
                .or(arg1)
                .unwrap_or(Value::Null);
            Ok(RecordPayload {
                kind,
                id,
                draft,
                query,
            })
        }
        _ => Err("Missing entity".into()),
    }
}

#[tauri::command]
pub async fn records_list_entities() -> Result<Value, String> {
    let entities: Vec<Value> = EntityKind::ALL
        .iter()
        .map(|kind| {
            serde_json::json!({
                "key": kind.key(),
                "label": kind.label(),
                "path": kind.path(),
            })
        })
        .collect();
    Ok(Value::Array(entities))
}

#[tauri::command]
pub async fn records_get_state(
    arg0: Option<Value>,
    stores: tauri::State<'_, Stores>,
) -> Result<Value, String> {
    let payload = parse_record_payload(arg0, None)?;
    Ok(stores.get(payload.kind).snapshot_json())
}

#[tauri::command]
pub async fn records_fetch(
    arg0: Option<Value>,
    stores: tauri::State<'_, Stores>,
    backend: tauri::State<'_, HttpBackend>,
    app: tauri::AppHandle,
) -> Result<Value, String> {
    let payload = parse_record_payload(arg0, None)?;
    stores
        .get(payload.kind)
        .fetch_json(backend.inner(), &app)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn records_search(
    arg0: Option<Value>,
    arg1: Option<Value>,
    stores: tauri::State<'_, Stores>,
) -> Result<Value, String> {
    let payload = parse_record_payload(arg0, arg1)?;
    Ok(stores.get(payload.kind).search_json(&payload.query))
}

#[tauri::command]
pub async fn records_create(
    arg0: Option<Value>,
    arg1: Option<Value>,
    stores: tauri::State<'_, Stores>,
    backend: tauri::State<'_, HttpBackend>,
    app: tauri::AppHandle,
) -> Result<Value, String> {
    let payload = parse_record_payload(arg0, arg1)?;
    stores
        .get(payload.kind)
        .create_json(backend.inner(), &app, payload.draft)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn records_update(
    arg0: Option<Value>,
    arg1: Option<Value>,
    stores: tauri::State<'_, Stores>,
    backend: tauri::State<'_, HttpBackend>,
    app: tauri::AppHandle,
) -> Result<Value, String> {
    let payload = parse_record_payload(arg0, arg1)?;
    let id = payload.id.ok_or("Missing record id")?;
    stores
        .get(payload.kind)
        .update_json(backend.inner(), &app, &id, payload.draft)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn records_delete(
    arg0: Option<Value>,
    arg1: Option<Value>,
    stores: tauri::State<'_, Stores>,
    backend: tauri::State<'_, HttpBackend>,
    app: tauri::AppHandle,
) -> Result<Value, String> {
    let payload = parse_record_payload(arg0, arg1)?;
    let id = payload.id.ok_or("Missing record id")?;
    stores
        .get(payload.kind)
        .delete_json(backend.inner(), &app, &id)
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod dto_tests {
    use super::*;

    #[test]
    fn parse_record_payload_supports_object_form() {
        let payload = parse_record_payload(
            Some(serde_json::json!({
                "entity": "caisses",
                "id": 12,
                "data": { "name": "Plastic 20kg" }
            })),
            None,
        )
        .expect("payload should parse");

        assert_eq!(payload.kind, EntityKind::Crates);
        assert_eq!(payload.id.as_deref(), Some("12"));
        assert_eq!(payload.draft, serde_json::json!({ "name": "Plastic 20kg" }));
    }

    #[test]
    fn parse_record_payload_supports_positional_form() {
        let create = parse_record_payload(
            Some(serde_json::json!("products")),
            Some(serde_json::json!({ "name": "Tomatoes", "unitPrice": 4.5 })),
        )
        .expect("create payload");
        assert_eq!(create.kind, EntityKind::Products);
        assert_eq!(create.draft["name"], serde_json::json!("Tomatoes"));
        assert!(create.id.is_none());

        let delete = parse_record_payload(Some(serde_json::json!("truck")), Some(serde_json::json!(7)))
            .expect("delete payload");
        assert_eq!(delete.kind, EntityKind::Trucks);
        assert_eq!(delete.id.as_deref(), Some("7"));

        let search = parse_record_payload(
            Some(serde_json::json!("fournisseurs")),
            Some(serde_json::json!("souk")),
        )
        .expect("search payload");
        assert_eq!(search.query, "souk");
    }

    #[test]
    fn parse_record_payload_reads_query_aliases() {
        let payload = parse_record_payload(
            Some(serde_json::json!({ "kind": "tournees", "q": "  atlas " })),
            None,
        )
        .expect("payload should parse");
        assert_eq!(payload.kind, EntityKind::Tournees);
        assert_eq!(payload.query, "atlas");
        assert_eq!(payload.draft, Value::Null);
    }

    #[test]
    fn parse_record_payload_rejects_unknown_or_missing_entity() {
        assert!(parse_record_payload(None, None).is_err());
        assert!(parse_record_payload(Some(serde_json::json!({ "id": 1 })), None).is_err());
        let err = parse_record_payload(Some(serde_json::json!("invoices")), None)
            .expect_err("unknown entity");
        assert_eq!(err, "Unknown entity: invoices");
    }
}
