//! Period selection for financial reports.

use chrono::{Days, Local, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::PeriodError;
use crate::models::lenient::parse_date;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PeriodPreset {
    #[default]
    Today,
    LastWeek,
    #[serde(rename = "last15Days")]
    Last15Days,
    LastMonth,
    Custom,
}

impl PeriodPreset {
    pub const PRESETS: [PeriodPreset; 4] = [
        PeriodPreset::Today,
        PeriodPreset::LastWeek,
        PeriodPreset::Last15Days,
        PeriodPreset::LastMonth,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PeriodPreset::Today => "today",
            PeriodPreset::LastWeek => "lastWeek",
            PeriodPreset::Last15Days => "last15Days",
            PeriodPreset::LastMonth => "lastMonth",
            PeriodPreset::Custom => "custom",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, PeriodError> {
        let normalized = raw.trim().to_ascii_lowercase().replace(['-', '_', ' '], "");
        match normalized.as_str() {
            "today" | "day" => Ok(PeriodPreset::Today),
            "lastweek" | "week" | "last7days" => Ok(PeriodPreset::LastWeek),
            "last15days" | "15days" => Ok(PeriodPreset::Last15Days),
            "lastmonth" | "month" => Ok(PeriodPreset::LastMonth),
            "custom" => Ok(PeriodPreset::Custom),
            _ => Err(PeriodError::UnknownPreset(raw.trim().to_string())),
        }
    }
}

/// Inclusive range sent to the report endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub period: PeriodPreset,
}

impl DateRange {
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("startDate", self.start_date.format("%Y-%m-%d").to_string()),
            ("endDate", self.end_date.format("%Y-%m-%d").to_string()),
            ("period", self.period.as_str().to_string()),
        ]
    }
}

pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Compute the range for a named preset ending on `today`.
///
/// `Custom` has no implicit bounds and is rejected here; use [`custom`].
pub fn resolve(preset: PeriodPreset, today: NaiveDate) -> Result<DateRange, PeriodError> {
    let start = match preset {
        PeriodPreset::Today => Some(today),
        PeriodPreset::LastWeek => today.checked_sub_days(Days::new(7)),
        PeriodPreset::Last15Days => today.checked_sub_days(Days::new(15)),
        // Clamps to the last day of a shorter month (Mar 31 -> Feb 29).
        PeriodPreset::LastMonth => today.checked_sub_months(Months::new(1)),
        PeriodPreset::Custom => return Err(PeriodError::MissingBound),
    };
    let start_date = start.ok_or_else(|| PeriodError::InvalidDate(today.to_string()))?;
    Ok(DateRange {
        start_date,
        end_date: today,
        period: preset,
    })
}

/// Build a custom range. Both bounds are required and must be ordered.
pub fn custom(start: Option<&str>, end: Option<&str>) -> Result<DateRange, PeriodError> {
    let start = start.map(str::trim).filter(|s| !s.is_empty());
    let end = end.map(str::trim).filter(|s| !s.is_empty());
    let (Some(start), Some(end)) = (start, end) else {
        return Err(PeriodError::MissingBound);
    };
    let start_date =
        parse_date(start).ok_or_else(|| PeriodError::InvalidDate(start.to_string()))?;
    let end_date = parse_date(end).ok_or_else(|| PeriodError::InvalidDate(end.to_string()))?;
    if start_date > end_date {
        return Err(PeriodError::Inverted {
            start: start_date.to_string(),
            end: end_date.to_string(),
        });
    }
    Ok(DateRange {
        start_date,
        end_date,
        period: PeriodPreset::Custom,
    })
}
