//! Financial report view: metric cards and per-day line charts for the
//! selected period.
//!
//! Totals are displayed as delivered by the backend; nothing is aggregated
//! client-side.

use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::{unwrap_data, with_query, Backend};
use crate::error::{ApiError, ReportError};
use crate::events::{self, EventSink, EVENT_REPORT_CHANGED};
use crate::models::lenient::{parse_amount, parse_date, value_to_f64};
use crate::period::{self, DateRange, PeriodPreset};

pub const REPORT_PATH: &str = "/api/reports/financial";

const CURRENCY: &str = "MAD";

// ---------------------------------------------------------------------------
// Summary payload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummary {
    pub total_revenue: f64,
    pub total_purchases: f64,
    pub total_payments: f64,
    pub revenue_by_date: BTreeMap<NaiveDate, f64>,
    pub purchases_by_date: BTreeMap<NaiveDate, f64>,
    pub payments_by_date: BTreeMap<NaiveDate, f64>,
}

fn field<'a>(obj: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| obj.get(*name))
}

/// An absent total is zero; a present one that is not a number fails the
/// whole summary.
fn total(obj: &Value, names: &[&str]) -> Result<f64, ApiError> {
    let Some(raw) = field(obj, names) else {
        return Ok(0.0);
    };
    parse_amount(raw)
        .map(|amount| amount.unwrap_or(0.0))
        .map_err(|e| ApiError::InvalidJson(format!("{}: {e}", names.first().unwrap_or(&"total"))))
}

/// Per-date series arrive either as `{"2024-01-01": 120}` or as
/// `[{"date": "2024-01-01", "amount": 120}]`.
fn series(obj: &Value, names: &[&str]) -> BTreeMap<NaiveDate, f64> {
    let mut out = BTreeMap::new();
    match field(obj, names) {
        Some(Value::Object(map)) => {
            for (key, raw) in map {
                match (parse_date(key), value_to_f64(raw)) {
                    (Some(date), Some(amount)) => {
                        out.insert(date, amount);
                    }
                    _ => warn!(date = %key, "skipping malformed report point"),
                }
            }
        }
        Some(Value::Array(points)) => {
            for point in points {
                let date = point
                    .get("date")
                    .or_else(|| point.get("day"))
                    .and_then(Value::as_str)
                    .and_then(parse_date);
                let amount = field(point, &["amount", "total", "value"]).and_then(value_to_f64);
                match (date, amount) {
                    (Some(date), Some(amount)) => {
                        out.insert(date, amount);
                    }
                    _ => warn!(point = %point, "skipping malformed report point"),
                }
            }
        }
        Some(Value::Null) | None => {}
        Some(other) => warn!(value = %other, "unexpected report series shape"),
    }
    out
}

pub fn parse_summary(value: Value) -> Result<FinancialSummary, ApiError> {
    let body = unwrap_data(value);
    if !body.is_object() {
        return Err(ApiError::InvalidJson(
            "financial report is not a JSON object".into(),
        ));
    }
    Ok(FinancialSummary {
        total_revenue: total(&body, &["totalRevenue", "total_revenue", "revenue"])?,
        total_purchases: total(&body, &["totalPurchases", "total_purchases", "purchases"])?,
        total_payments: total(&body, &["totalPayments", "total_payments", "payments"])?,
        revenue_by_date: series(&body, &["revenueByDate", "revenue_by_date"]),
        purchases_by_date: series(&body, &["purchasesByDate", "purchases_by_date"]),
        payments_by_date: series(&body, &["paymentsByDate", "payments_by_date"]),
    })
}

// ---------------------------------------------------------------------------
// Presentation
// ---------------------------------------------------------------------------

/// Format an amount the way Moroccan invoices print it: `1 234,50 MAD`.
pub fn format_mad(amount: f64) -> String {
    let cents = (amount * 100.0).round() as i64;
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    let digits = (cents / 100).to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    format!("{sign}{grouped},{:02} {CURRENCY}", cents % 100)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricCard {
    pub key: &'static str,
    pub label: &'static str,
    pub amount: f64,
    pub formatted: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub date: NaiveDate,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    pub key: &'static str,
    pub label: &'static str,
    pub points: Vec<ChartPoint>,
    pub y_min: f64,
    pub y_max: f64,
}

const METRICS: [(&str, &str); 3] = [
    ("revenue", "Revenue"),
    ("purchases", "Purchases"),
    ("payments", "Payments"),
];

impl FinancialSummary {
    pub fn cards(&self) -> Vec<MetricCard> {
        let totals = [self.total_revenue, self.total_purchases, self.total_payments];
        METRICS
            .iter()
            .zip(totals)
            .map(|(&(key, label), amount)| MetricCard {
                key,
                label,
                amount,
                formatted: format_mad(amount),
            })
            .collect()
    }

    /// One series per metric; the y axis always includes zero.
    pub fn charts(&self) -> Vec<ChartSeries> {
        let sources = [
            &self.revenue_by_date,
            &self.purchases_by_date,
            &self.payments_by_date,
        ];
        METRICS
            .iter()
            .zip(sources)
            .map(|(&(key, label), by_date)| {
                let points: Vec<ChartPoint> = by_date
                    .iter()
                    .map(|(date, amount)| ChartPoint {
                        date: *date,
                        amount: *amount,
                    })
                    .collect();
                let y_min = points.iter().map(|p| p.amount).fold(0.0, f64::min);
                let y_max = points.iter().map(|p| p.amount).fold(0.0, f64::max);
                ChartSeries {
                    key,
                    label,
                    points,
                    y_min,
                    y_max,
                }
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Report store
// ---------------------------------------------------------------------------

struct ReportState {
    /// Range of the summary on display.
    range: DateRange,
    /// Range of the fetch in flight, committed with its summary.
    pending: Option<DateRange>,
    summary: Option<FinancialSummary>,
    loading: bool,
    error: Option<String>,
    last_fetched_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSnapshot {
    pub range: DateRange,
    pub pending_range: Option<DateRange>,
    pub summary: Option<FinancialSummary>,
    pub cards: Vec<MetricCard>,
    pub charts: Vec<ChartSeries>,
    pub loading: bool,
    pub error: Option<String>,
    pub last_fetched_at: Option<String>,
}

pub struct ReportStore {
    state: Mutex<ReportState>,
}

impl ReportStore {
    /// Starts on the "today" preset with nothing loaded.
    pub fn new(today: NaiveDate) -> Self {
        Self {
            state: Mutex::new(ReportState {
                range: DateRange {
                    start_date: today,
                    end_date: today,
                    period: PeriodPreset::Today,
                },
                pending: None,
                summary: None,
                loading: false,
                error: None,
                last_fetched_at: None,
            }),
        }
    }

    pub fn snapshot(&self) -> ReportSnapshot {
        match self.state.lock() {
            Ok(state) => snapshot_of(&state),
            Err(poisoned) => snapshot_of(&poisoned.into_inner()),
        }
    }

    pub fn snapshot_json(&self) -> Value {
        serde_json::to_value(self.snapshot()).unwrap_or(Value::Null)
    }

    pub fn range(&self) -> DateRange {
        self.snapshot().range
    }

    fn update_state(&self, sink: &dyn EventSink, apply: impl FnOnce(&mut ReportState)) {
        let snapshot = {
            let mut state = match self.state.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            apply(&mut state);
            snapshot_of(&state)
        };
        match serde_json::to_value(&snapshot) {
            Ok(payload) => sink.emit_json(EVENT_REPORT_CHANGED, payload),
            Err(e) => warn!(error = %e, "failed to serialize report snapshot"),
        }
    }

    pub async fn select_preset(
        &self,
        backend: &dyn Backend,
        sink: &dyn EventSink,
        preset: PeriodPreset,
        today: NaiveDate,
    ) -> Result<ReportSnapshot, ReportError> {
        let range = period::resolve(preset, today)?;
        self.load(backend, sink, range).await
    }

    /// A rejected custom range leaves the current selection alone.
    pub async fn apply_custom_range(
        &self,
        backend: &dyn Backend,
        sink: &dyn EventSink,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<ReportSnapshot, ReportError> {
        let range = match period::custom(start, end) {
            Ok(range) => range,
            Err(e) => {
                debug!(?start, ?end, error = %e, "custom range rejected");
                return Err(e.into());
            }
        };
        self.load(backend, sink, range).await
    }

    pub async fn refresh(
        &self,
        backend: &dyn Backend,
        sink: &dyn EventSink,
    ) -> Result<ReportSnapshot, ReportError> {
        let range = self.range();
        self.load(backend, sink, range).await
    }

    async fn load(
        &self,
        backend: &dyn Backend,
        sink: &dyn EventSink,
        range: DateRange,
    ) -> Result<ReportSnapshot, ReportError> {
        self.update_state(sink, |state| {
            state.pending = Some(range);
            state.loading = true;
        });

        let path = with_query(REPORT_PATH, &range.query_params());
        let result = match backend.request(Method::GET, &path, None).await {
            Ok(body) => parse_summary(body),
            Err(e) => Err(e),
        };

        match result {
            Ok(summary) => {
                info!(
                    period = range.period.as_str(),
                    start = %range.start_date,
                    end = %range.end_date,
                    "financial report loaded"
                );
                self.update_state(sink, move |state| {
                    if state.pending != Some(range) {
                        debug!(period = range.period.as_str(), "discarding superseded report");
                        return;
                    }
                    state.range = range;
                    state.pending = None;
                    state.summary = Some(summary);
                    state.loading = false;
                    state.error = None;
                    state.last_fetched_at = Some(Utc::now().to_rfc3339());
                });
                Ok(self.snapshot())
            }
            Err(e) => {
                warn!(period = range.period.as_str(), error = %e, "financial report failed");
                let message = e.to_string();
                self.update_state(sink, move |state| {
                    if state.pending != Some(range) {
                        return;
                    }
                    state.pending = None;
                    state.loading = false;
                    state.error = Some(message);
                });
                events::notify_error(sink, format!("Could not load the financial report: {e}"));
                if e.is_unauthorized() {
                    events::auth_required(sink, "session_expired", "reports");
                }
                Err(e.into())
            }
        }
    }
}

fn snapshot_of(state: &ReportState) -> ReportSnapshot {
    let (cards, charts) = match &state.summary {
        Some(summary) => (summary.cards(), summary.charts()),
        None => (Vec::new(), Vec::new()),
    };
    ReportSnapshot {
        range: state.range,
        pending_range: state.pending,
        summary: state.summary.clone(),
        cards,
        charts,
        loading: state.loading,
        error: state.error.clone(),
        last_fetched_at: state.last_fetched_at.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::FakeBackend;
    use crate::error::PeriodError;
    use crate::events::testing::RecordingSink;
    use crate::events::EVENT_NOTIFICATION;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn report_body() -> Value {
        serde_json::json!({
            "data": {
                "totalRevenue": 15000,
                "totalPurchases": "9 200,50",
                "totalPayments": 4300.25,
                "revenueByDate": {
                    "2024-01-03": 5000,
                    "2024-01-01": 10000
                },
                "purchasesByDate": [
                    { "date": "2024-01-02", "total": 9200.5 }
                ],
                "paymentsByDate": null
            }
        })
    }

    fn report_path(start: &str, end: &str, period: &str) -> String {
        format!("{REPORT_PATH}?startDate={start}&endDate={end}&period={period}")
    }

    #[test]
    fn format_mad_groups_thousands() {
        assert_eq!(format_mad(1234.5), "1 234,50 MAD");
        assert_eq!(format_mad(0.0), "0,00 MAD");
        assert_eq!(format_mad(999.999), "1 000,00 MAD");
        assert_eq!(format_mad(1_250_000.0), "1 250 000,00 MAD");
        assert_eq!(format_mad(-42.1), "-42,10 MAD");
    }

    #[test]
    fn summary_parses_maps_and_point_lists() {
        let summary = parse_summary(report_body()).expect("summary parses");
        assert_eq!(summary.total_revenue, 15000.0);
        assert_eq!(summary.total_purchases, 9200.5);
        assert_eq!(summary.purchases_by_date.get(&day(2024, 1, 2)), Some(&9200.5));
        assert!(summary.payments_by_date.is_empty());

        assert!(parse_summary(serde_json::json!([1, 2])).is_err());
    }

    #[test]
    fn unreadable_total_fails_instead_of_showing_zero() {
        let err = parse_summary(serde_json::json!({
            "totalRevenue": "12 000,00",
            "totalPurchases": "N/A"
        }))
        .expect_err("garbage total");
        assert!(matches!(err, ApiError::InvalidJson(ref msg) if msg.contains("totalPurchases")));

        let summary = parse_summary(serde_json::json!({ "totalRevenue": "1,250.50" }))
            .expect("absent totals default to zero");
        assert_eq!(summary.total_revenue, 1250.5);
        assert_eq!(summary.total_payments, 0.0);
    }

    #[test]
    fn charts_are_sorted_and_skip_absent_dates() {
        let summary = parse_summary(report_body()).expect("summary parses");
        let charts = summary.charts();
        assert_eq!(charts.len(), 3);

        let revenue = &charts[0];
        assert_eq!(revenue.key, "revenue");
        let dates: Vec<NaiveDate> = revenue.points.iter().map(|p| p.date).collect();
        assert_eq!(dates, vec![day(2024, 1, 1), day(2024, 1, 3)]);
        assert_eq!(revenue.y_min, 0.0);
        assert_eq!(revenue.y_max, 10000.0);

        assert!(charts[2].points.is_empty());
    }

    #[test]
    fn chart_axis_extends_below_zero_for_negative_points() {
        let summary = FinancialSummary {
            revenue_by_date: BTreeMap::from([(day(2024, 1, 1), -300.0), (day(2024, 1, 2), 50.0)]),
            ..Default::default()
        };
        let revenue = &summary.charts()[0];
        assert_eq!(revenue.y_min, -300.0);
        assert_eq!(revenue.y_max, 50.0);
    }

    #[test]
    fn cards_use_mad_formatting() {
        let summary = parse_summary(report_body()).expect("summary parses");
        let cards = summary.cards();
        let keys: Vec<&str> = cards.iter().map(|c| c.key).collect();
        assert_eq!(keys, vec!["revenue", "purchases", "payments"]);
        assert_eq!(cards[1].formatted, "9 200,50 MAD");
    }

    #[tokio::test]
    async fn each_preset_issues_one_fetch_with_its_bounds() {
        let today = day(2024, 3, 20);
        let expected = [
            (PeriodPreset::Today, "2024-03-20"),
            (PeriodPreset::LastWeek, "2024-03-13"),
            (PeriodPreset::Last15Days, "2024-03-05"),
            (PeriodPreset::LastMonth, "2024-02-20"),
        ];
        for (preset, start) in expected {
            let backend = FakeBackend::default();
            let path = report_path(start, "2024-03-20", preset.as_str());
            backend.respond(Method::GET, &path, Ok(report_body()));
            let sink = RecordingSink::default();
            let store = ReportStore::new(today);

            let snapshot = store
                .select_preset(&backend, &sink, preset, today)
                .await
                .expect("report loads");

            assert_eq!(backend.calls().len(), 1, "{preset:?}");
            assert_eq!(backend.count(Method::GET, &path), 1, "{preset:?}");
            assert_eq!(snapshot.range.start_date.to_string(), start);
            assert_eq!(snapshot.range.end_date, today);
            assert_eq!(snapshot.cards.len(), 3);
            assert!(sink.named(EVENT_NOTIFICATION).is_empty());
        }
    }

    #[tokio::test]
    async fn custom_range_uses_exact_bounds() {
        let backend = FakeBackend::default();
        let path = report_path("2024-01-01", "2024-01-31", "custom");
        backend.respond(Method::GET, &path, Ok(report_body()));
        let sink = RecordingSink::default();
        let store = ReportStore::new(day(2024, 3, 20));

        let snapshot = store
            .apply_custom_range(&backend, &sink, Some("2024-01-01"), Some("2024-01-31"))
            .await
            .expect("custom range loads");

        assert_eq!(backend.count(Method::GET, &path), 1);
        assert_eq!(snapshot.range.period, PeriodPreset::Custom);
        assert_eq!(snapshot.range.start_date, day(2024, 1, 1));
        assert_eq!(snapshot.range.end_date, day(2024, 1, 31));
    }

    #[tokio::test]
    async fn incomplete_custom_range_is_not_fetched() {
        let backend = FakeBackend::default();
        let sink = RecordingSink::default();
        let store = ReportStore::new(day(2024, 3, 20));

        let err = store
            .apply_custom_range(&backend, &sink, Some("2024-01-01"), None)
            .await
            .expect_err("end date missing");

        assert_eq!(err, ReportError::Period(PeriodError::MissingBound));
        assert!(backend.calls().is_empty());
        assert_eq!(store.range().period, PeriodPreset::Today);
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_summary() {
        let today = day(2024, 3, 20);
        let backend = FakeBackend::default();
        let path = report_path("2024-03-20", "2024-03-20", "today");
        backend.respond(Method::GET, &path, Ok(report_body()));
        backend.respond(Method::GET, &path, Err(ApiError::Network("http://localhost:8000".into())));
        let sink = RecordingSink::default();
        let store = ReportStore::new(today);

        store
            .select_preset(&backend, &sink, PeriodPreset::Today, today)
            .await
            .expect("first load succeeds");
        let before = store.snapshot().summary;
        store
            .refresh(&backend, &sink)
            .await
            .expect_err("second load fails");

        let after = store.snapshot();
        assert_eq!(after.summary, before);
        assert!(after.error.is_some());
        assert!(!after.loading);
        assert_eq!(sink.notifications("error").len(), 1);
        assert!(!sink.named(EVENT_REPORT_CHANGED).is_empty());
    }

    #[tokio::test]
    async fn failed_period_switch_keeps_displayed_range_with_its_summary() {
        let today = day(2024, 3, 20);
        let backend = FakeBackend::default();
        let today_path = report_path("2024-03-20", "2024-03-20", "today");
        let month_path = report_path("2024-02-20", "2024-03-20", "lastMonth");
        backend.respond(Method::GET, &today_path, Ok(report_body()));
        backend.respond(Method::GET, &month_path, Err(ApiError::Server(503)));
        let sink = RecordingSink::default();
        let store = ReportStore::new(today);

        store
            .select_preset(&backend, &sink, PeriodPreset::Today, today)
            .await
            .expect("today loads");
        let before = store.snapshot();
        store
            .select_preset(&backend, &sink, PeriodPreset::LastMonth, today)
            .await
            .expect_err("last month fails");

        let after = store.snapshot();
        assert_eq!(after.range, before.range);
        assert_eq!(after.range.period, PeriodPreset::Today);
        assert_eq!(after.summary, before.summary);
        assert_eq!(after.pending_range, None);
        assert!(!after.loading);
        assert!(after.error.is_some());

        // While the fetch is in flight the old range is still the one shown.
        let in_flight = sink
            .named(EVENT_REPORT_CHANGED)
            .into_iter()
            .find(|payload| payload["pendingRange"]["period"] == "lastMonth")
            .expect("loading snapshot emitted");
        assert_eq!(in_flight["range"]["period"], "today");
        assert_eq!(in_flight["loading"], true);
    }
}
