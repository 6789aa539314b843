use serde::{Deserialize, Deserializer, Serialize, Serializer};
use validator::Validate;

use super::lenient;
use super::{not_blank, EntityKind, Resource};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Truck {
    #[serde(deserialize_with = "lenient::id")]
    pub id: String,
    #[serde(
        default,
        alias = "plate_number",
        alias = "matricule",
        alias = "plate",
        deserialize_with = "lenient::string_or_empty"
    )]
    pub plate_number: String,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub model: Option<String>,
    #[serde(default, alias = "capacite", deserialize_with = "lenient::f64_or_zero")]
    pub capacity: f64,
    #[serde(default, alias = "created_at", deserialize_with = "lenient::opt_string")]
    pub created_at: Option<String>,
    #[serde(default, alias = "updated_at", deserialize_with = "lenient::opt_string")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TruckDraft {
    #[validate(required, custom = "not_blank")]
    #[serde(
        default,
        alias = "plate_number",
        alias = "matricule",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub plate_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub model: Option<String>,
    #[validate(required, range(min = 0.0))]
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_f64")]
    pub capacity: Option<f64>,
}

impl Resource for Truck {
    type Draft = TruckDraft;
    const KIND: EntityKind = EntityKind::Trucks;

    fn search_text(&self) -> String {
        format!(
            "{} {}",
            self.plate_number,
            self.model.as_deref().unwrap_or_default()
        )
        .to_lowercase()
    }
}

/// Lifecycle of a tournée. Transitions are driven by the backend; the
/// client only reflects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TourneeStatus {
    #[default]
    Planned,
    Active,
    Completed,
}

impl TourneeStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "planned" | "pending" | "scheduled" | "created" | "planifiee" => {
                Some(TourneeStatus::Planned)
            }
            "active" | "in_progress" | "inprogress" | "started" | "en_cours" => {
                Some(TourneeStatus::Active)
            }
            "completed" | "done" | "finished" | "terminee" => Some(TourneeStatus::Completed),
            _ => None,
        }
    }

    /// The next step of the linear lifecycle, if any.
    pub fn next_status(self) -> Option<Self> {
        match self {
            TourneeStatus::Planned => Some(TourneeStatus::Active),
            TourneeStatus::Active => Some(TourneeStatus::Completed),
            TourneeStatus::Completed => None,
        }
    }
}

impl<'de> Deserialize<'de> for TourneeStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        if raw.trim().is_empty() {
            return Ok(TourneeStatus::default());
        }
        TourneeStatus::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown tournée status: {raw}")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub id: Option<String>,
    #[serde(default, alias = "client", alias = "address", deserialize_with = "lenient::string_or_empty")]
    pub name: String,
    #[serde(default, alias = "position", alias = "sequence")]
    pub order: Option<u32>,
}

/// Serialized through [`TourneeRow`], so list views get stops in visiting
/// order and the status the tournée can move to next.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tournee {
    #[serde(deserialize_with = "lenient::id")]
    pub id: String,
    #[serde(default)]
    pub status: TourneeStatus,
    #[serde(default, alias = "truck_id", alias = "camionId", deserialize_with = "lenient::opt_string")]
    pub truck_id: Option<String>,
    #[serde(default, alias = "employee_id", alias = "driverId", deserialize_with = "lenient::opt_string")]
    pub employee_id: Option<String>,
    #[serde(default, alias = "start_time", deserialize_with = "lenient::opt_string")]
    pub start_time: Option<String>,
    #[serde(default, alias = "end_time", deserialize_with = "lenient::opt_string")]
    pub end_time: Option<String>,
    #[serde(default)]
    pub stops: Vec<Stop>,
}

impl Tournee {
    /// Stops in visiting order; unordered stops keep their list position
    /// after the ordered ones.
    pub fn ordered_stops(&self) -> Vec<&Stop> {
        let mut stops: Vec<&Stop> = self.stops.iter().collect();
        stops.sort_by_key(|stop| stop.order.unwrap_or(u32::MAX));
        stops
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TourneeRow<'a> {
    id: &'a str,
    status: TourneeStatus,
    next_status: Option<TourneeStatus>,
    truck_id: Option<&'a str>,
    employee_id: Option<&'a str>,
    start_time: Option<&'a str>,
    end_time: Option<&'a str>,
    stops: Vec<&'a Stop>,
}

impl Serialize for Tournee {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        TourneeRow {
            id: &self.id,
            status: self.status,
            next_status: self.status.next_status(),
            truck_id: self.truck_id.as_deref(),
            employee_id: self.employee_id.as_deref(),
            start_time: self.start_time.as_deref(),
            end_time: self.end_time.as_deref(),
            stops: self.ordered_stops(),
        }
        .serialize(serializer)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StopDraft {
    #[validate(required, custom = "not_blank")]
    #[serde(
        default,
        alias = "client",
        alias = "address",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TourneeDraft {
    #[validate(required, custom = "not_blank")]
    #[serde(
        default,
        alias = "truck_id",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub truck_id: Option<String>,
    #[validate(required, custom = "not_blank")]
    #[serde(
        default,
        alias = "employee_id",
        alias = "driverId",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub employee_id: Option<String>,
    #[serde(
        default,
        alias = "start_time",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub start_time: Option<String>,
    #[serde(
        default,
        alias = "end_time",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub end_time: Option<String>,
    #[validate]
    #[serde(default)]
    pub stops: Vec<StopDraft>,
}

impl Resource for Tournee {
    type Draft = TourneeDraft;
    const KIND: EntityKind = EntityKind::Tournees;

    fn search_text(&self) -> String {
        let stops: Vec<&str> = self.stops.iter().map(|s| s.name.as_str()).collect();
        format!(
            "{} {} {} {}",
            self.truck_id.as_deref().unwrap_or_default(),
            self.employee_id.as_deref().unwrap_or_default(),
            serde_json::to_value(self.status)
                .ok()
                .and_then(|v| v.as_str().map(String::from))
                .unwrap_or_default(),
            stops.join(" ")
        )
        .to_lowercase()
    }
}
