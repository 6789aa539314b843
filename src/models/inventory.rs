use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::lenient;
use super::{not_blank, EntityKind, Resource};

/// Stock of returnable crates (caisses).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Crate {
    #[serde(deserialize_with = "lenient::id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub name: String,
    #[serde(
        default,
        alias = "crate_type",
        alias = "type",
        deserialize_with = "lenient::opt_string"
    )]
    pub crate_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::f64_or_zero")]
    pub capacity: f64,
    #[serde(
        default,
        alias = "unit_price",
        alias = "price",
        deserialize_with = "lenient::f64_or_zero"
    )]
    pub unit_price: f64,
    #[serde(default, alias = "stock", deserialize_with = "lenient::f64_or_zero")]
    pub quantity: f64,
    #[serde(default, alias = "created_at", deserialize_with = "lenient::opt_string")]
    pub created_at: Option<String>,
    #[serde(default, alias = "updated_at", deserialize_with = "lenient::opt_string")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CrateDraft {
    #[validate(required, custom = "not_blank")]
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub name: Option<String>,
    #[serde(
        default,
        alias = "crate_type",
        alias = "type",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub crate_type: Option<String>,
    #[validate(required, range(min = 0.0))]
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_f64")]
    pub capacity: Option<f64>,
    #[validate(required, range(min = 0.0))]
    #[serde(
        default,
        alias = "unit_price",
        alias = "price",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_f64"
    )]
    pub unit_price: Option<f64>,
    #[validate(required, range(min = 0.0))]
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_f64")]
    pub quantity: Option<f64>,
}

impl Resource for Crate {
    type Draft = CrateDraft;
    const KIND: EntityKind = EntityKind::Crates;

    fn search_text(&self) -> String {
        format!(
            "{} {}",
            self.name,
            self.crate_type.as_deref().unwrap_or_default()
        )
        .to_lowercase()
    }
}

/// Produce or goods sold and tracked in stock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(deserialize_with = "lenient::id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub unit: Option<String>,
    #[serde(
        default,
        alias = "unit_price",
        alias = "price",
        deserialize_with = "lenient::f64_or_zero"
    )]
    pub unit_price: f64,
    #[serde(default, alias = "stock", deserialize_with = "lenient::f64_or_zero")]
    pub quantity: f64,
    #[serde(default, alias = "created_at", deserialize_with = "lenient::opt_string")]
    pub created_at: Option<String>,
    #[serde(default, alias = "updated_at", deserialize_with = "lenient::opt_string")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductDraft {
    #[validate(required, custom = "not_blank")]
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub unit: Option<String>,
    #[validate(required, range(min = 0.0))]
    #[serde(
        default,
        alias = "unit_price",
        alias = "price",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_f64"
    )]
    pub unit_price: Option<f64>,
    #[validate(required, range(min = 0.0))]
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_f64")]
    pub quantity: Option<f64>,
}

impl Resource for Product {
    type Draft = ProductDraft;
    const KIND: EntityKind = EntityKind::Products;

    fn search_text(&self) -> String {
        format!("{} {}", self.name, self.unit.as_deref().unwrap_or_default()).to_lowercase()
    }
}

/// Spoiled or discarded stock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Waste {
    #[serde(deserialize_with = "lenient::id")]
    pub id: String,
    #[serde(default, alias = "product_id", deserialize_with = "lenient::opt_string")]
    pub product_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::f64_or_zero")]
    pub quantity: f64,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_date")]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WasteDraft {
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
    #[validate(range(min = 0.0))]
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_f64")]
    pub amount: Option<f64>,
    #[validate(required)]
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_date")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub notes: Option<String>,
}

impl Resource for Waste {
    type Draft = WasteDraft;
    const KIND: EntityKind = EntityKind::Wastes;

    fn search_text(&self) -> String {
        format!(
            "{} {}",
            self.product_id.as_deref().unwrap_or_default(),
            self.notes.as_deref().unwrap_or_default()
        )
        .to_lowercase()
    }
}
