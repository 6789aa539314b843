use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::lenient;
use super::{not_blank, EntityKind, Resource};

/// Stock bought from a supplier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    #[serde(deserialize_with = "lenient::id")]
    pub id: String,
    #[serde(default, alias = "supplier_id", deserialize_with = "lenient::opt_string")]
    pub supplier_id: Option<String>,
    #[serde(default, alias = "product_id", deserialize_with = "lenient::opt_string")]
    pub product_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::f64_or_zero")]
    pub quantity: f64,
    #[serde(default, alias = "total", deserialize_with = "lenient::f64_or_zero")]
    pub amount: f64,
    #[serde(default, deserialize_with = "lenient::opt_date")]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseDraft {
    #[validate(required, custom = "not_blank")]
    #[serde(
        default,
        alias = "supplier_id",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub supplier_id: Option<String>,
    #[validate(required, custom = "not_blank")]
    #[serde(
        default,
        alias = "product_id",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub product_id: Option<String>,
    #[validate(required, range(min = 0.01))]
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_f64")]
    pub quantity: Option<f64>,
    #[validate(required, range(min = 0.0))]
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_f64")]
    pub amount: Option<f64>,
    #[validate(required)]
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_date")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub notes: Option<String>,
}

impl Resource for Purchase {
    type Draft = PurchaseDraft;
    const KIND: EntityKind = EntityKind::Purchases;

    fn search_text(&self) -> String {
        format!(
            "{} {} {}",
            self.supplier_id.as_deref().unwrap_or_default(),
            self.product_id.as_deref().unwrap_or_default(),
            self.notes.as_deref().unwrap_or_default()
        )
        .to_lowercase()
    }
}

/// Operating expense (fuel, rent, repairs...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Charge {
    #[serde(deserialize_with = "lenient::id")]
    pub id: String,
    #[serde(default, alias = "libelle", alias = "category", deserialize_with = "lenient::string_or_empty")]
    pub label: String,
    #[serde(default, alias = "montant", deserialize_with = "lenient::f64_or_zero")]
    pub amount: f64,
    #[serde(default, deserialize_with = "lenient::opt_date")]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChargeDraft {
    #[validate(required, custom = "not_blank")]
    #[serde(
        default,
        alias = "libelle",
        alias = "category",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub label: Option<String>,
    #[validate(required, range(min = 0.0))]
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_f64")]
    pub amount: Option<f64>,
    #[validate(required)]
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_date")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub notes: Option<String>,
}

impl Resource for Charge {
    type Draft = ChargeDraft;
    const KIND: EntityKind = EntityKind::Charges;

    fn search_text(&self) -> String {
        format!("{} {}", self.label, self.notes.as_deref().unwrap_or_default()).to_lowercase()
    }
}
