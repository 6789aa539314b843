use serde_json::Value;

use crate::api::HttpBackend;
use crate::period::{self, PeriodPreset};
use crate::reports::ReportStore;

#[derive(Debug, PartialEq)]
struct CustomRangePayload {
    start: Option<String>,
    end: Option<String>,
}

#[derive(Debug, PartialEq)]
enum PeriodSelection {
    Preset(PeriodPreset),
    Custom(CustomRangePayload),
}

fn parse_custom_range_payload(arg0: Option<Value>, arg1: Option<Value>) -> CustomRangePayload {
    match (arg0, arg1) {
        (Some(obj @ Value::Object(_)), _) => CustomRangePayload {
            start: crate::value_str(&obj, &["startDate", "start_date", "start", "from"]),
            end: crate::value_str(&obj, &["endDate", "end_date", "end", "to"]),
        },
        (start, end) => CustomRangePayload {
            start: start.as_ref().and_then(Value::as_str).map(String::from),
            end: end.as_ref().and_then(Value::as_str).map(String::from),
        },
    }
}

/// `"lastWeek"`, `{ period: "lastWeek" }` or
/// `{ period: "custom", startDate, endDate }`.
fn parse_period_payload(arg0: Option<Value>) -> Result<PeriodSelection, String> {
    let raw = match &arg0 {
        Some(Value::String(s)) => s.clone(),
        Some(obj @ Value::Object(_)) => {
            crate::value_str(obj, &["period", "preset", "value"]).ok_or("Missing period")?
        }
        _ => return Err("Missing period".into()),
    };
    match PeriodPreset::parse(&raw).map_err(|e| e.to_string())? {
        PeriodPreset::Custom => Ok(PeriodSelection::Custom(parse_custom_range_payload(arg0, None))),
        preset => Ok(PeriodSelection::Preset(preset)),
    }
}

#[tauri::command]
pub async fn report_get_state(reports: tauri::State<'_, ReportStore>) -> Result<Value, String> {
    Ok(reports.snapshot_json())
}

#[tauri::command]
pub async fn report_list_periods() -> Result<Value, String> {
    let presets: Vec<&str> = PeriodPreset::PRESETS
        .iter()
        .chain(std::iter::once(&PeriodPreset::Custom))
        .map(|p| p.as_str())
        .collect();
    Ok(serde_json::json!(presets))
}

#[tauri::command]
pub async fn report_select_period(
    arg0: Option<Value>,
    reports: tauri::State<'_, ReportStore>,
    backend: tauri::State<'_, HttpBackend>,
    app: tauri::AppHandle,
) -> Result<Value, String> {
    let snapshot = match parse_period_payload(arg0)? {
        PeriodSelection::Preset(preset) => {
            reports
                .select_preset(backend.inner(), &app, preset, period::local_today())
                .await
        }
        PeriodSelection::Custom(range) => {
            reports
                .apply_custom_range(
                    backend.inner(),
                    &app,
                    range.start.as_deref(),
                    range.end.as_deref(),
                )
                .await
        }
    }
    .map_err(|e| e.to_string())?;
    serde_json::to_value(snapshot).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn report_apply_custom_range(
    arg0: Option<Value>,
    arg1: Option<Value>,
    reports: tauri::State<'_, ReportStore>,
    backend: tauri::State<'_, HttpBackend>,
    app: tauri::AppHandle,
) -> Result<Value, String> {
    let range = parse_custom_range_payload(arg0, arg1);
    let snapshot = reports
        .apply_custom_range(
            backend.inner(),
            &app,
            range.start.as_deref(),
            range.end.as_deref(),
        )
        .await
        .map_err(|e| e.to_string())?;
    serde_json::to_value(snapshot).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn report_refresh(
    reports: tauri::State<'_, ReportStore>,
    backend: tauri::State<'_, HttpBackend>,
    app: tauri::AppHandle,
) -> Result<Value, String> {
    let snapshot = reports
        .refresh(backend.inner(), &app)
        .await
        .map_err(|e| e.to_string())?;
    serde_json::to_value(snapshot).map_err(|e| e.to_string())
}
