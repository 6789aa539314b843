//! Business records mirrored from the backend, and the drafts that the
//! add/edit sheets submit.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::api::unwrap_data;
use crate::error::ApiError;

pub mod finance;
pub mod fleet;
pub mod inventory;
pub(crate) mod lenient;
pub mod people;

pub use finance::{Charge, ChargeDraft, Purchase, PurchaseDraft};
pub use fleet::{Stop, StopDraft, Tournee, TourneeDraft, TourneeStatus, Truck, TruckDraft};
pub use inventory::{Crate, CrateDraft, Product, ProductDraft, Waste, WasteDraft};
pub use people::{Employee, EmployeeDraft, Supplier, SupplierDraft};

/// Every entity screen of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Crates,
    Products,
    Employees,
    Trucks,
    Suppliers,
    Purchases,
    Charges,
    Wastes,
    Tournees,
}

impl EntityKind {
    pub const ALL: [EntityKind; 9] = [
        EntityKind::Crates,
        EntityKind::Products,
        EntityKind::Employees,
        EntityKind::Trucks,
        EntityKind::Suppliers,
        EntityKind::Purchases,
        EntityKind::Charges,
        EntityKind::Wastes,
        EntityKind::Tournees,
    ];

    pub fn key(self) -> &'static str {
        match self {
            EntityKind::Crates => "crates",
            EntityKind::Products => "products",
            EntityKind::Employees => "employees",
            EntityKind::Trucks => "trucks",
            EntityKind::Suppliers => "suppliers",
            EntityKind::Purchases => "purchases",
            EntityKind::Charges => "charges",
            EntityKind::Wastes => "wastes",
            EntityKind::Tournees => "tournees",
        }
    }

    /// Collection path on the backend.
    pub fn path(self) -> String {
        format!("/api/{}", self.key())
    }

    /// Human label used in notifications.
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Crates => "Crate",
            EntityKind::Products => "Product",
            EntityKind::Employees => "Employee",
            EntityKind::Trucks => "Truck",
            EntityKind::Suppliers => "Supplier",
            EntityKind::Purchases => "Purchase",
            EntityKind::Charges => "Charge",
            EntityKind::Wastes => "Waste entry",
            EntityKind::Tournees => "Tournée",
        }
    }

    /// Accepts plural/singular keys and the French screen names.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace(['-', '_', ' '], "");
        let kind = match normalized.as_str() {
            "crates" | "crate" | "caisses" | "caisse" => EntityKind::Crates,
            "products" | "product" | "produits" | "produit" => EntityKind::Products,
            "employees" | "employee" | "employes" | "employe" => EntityKind::Employees,
            "trucks" | "truck" | "camions" | "camion" => EntityKind::Trucks,
            "suppliers" | "supplier" | "fournisseurs" | "fournisseur" => EntityKind::Suppliers,
            "purchases" | "purchase" | "achats" | "achat" => EntityKind::Purchases,
            "charges" | "charge" => EntityKind::Charges,
            "wastes" | "waste" | "pertes" | "perte" => EntityKind::Wastes,
            "tournees" | "tournee" | "tournées" | "tournée" | "routes" | "route" | "trips"
            | "trip" => EntityKind::Tournees,
            _ => return None,
        };
        Some(kind)
    }
}

/// A backend-owned record with its create/update form.
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    type Draft: Validate + Serialize + DeserializeOwned + Clone + Send + Sync + 'static;

    const KIND: EntityKind;

    /// Lower-cased text the list search box matches against.
    fn search_text(&self) -> String;
}

/// Reject strings made only of whitespace.
pub(crate) fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn to_camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Names (camelCase, as the form knows them) of every field that failed.
pub(crate) fn invalid_fields(errors: &ValidationErrors) -> Vec<String> {
    let mut fields: Vec<String> = errors
        .errors()
        .keys()
        .map(|field| to_camel_case(field))
        .collect();
    fields.sort();
    fields
}

/// Decode a collection response, skipping rows that cannot be read.
pub(crate) fn parse_list<R: Resource>(value: Value) -> Result<Vec<R>, ApiError> {
    let rows = match unwrap_data(value) {
        Value::Array(rows) => rows,
        Value::Null => Vec::new(),
        other => {
            return Err(ApiError::InvalidJson(format!(
                "expected a list of {}, got {}",
                R::KIND.key(),
                kind_of(&other)
            )))
        }
    };

    let total = rows.len();
    let items: Vec<R> = rows
        .into_iter()
        .filter_map(|row| match serde_json::from_value::<R>(row) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(entity = R::KIND.key(), error = %e, "skipping unreadable row");
                None
            }
        })
        .collect();
    if items.len() < total {
        warn!(
            entity = R::KIND.key(),
            kept = items.len(),
            total,
            "some rows were dropped while decoding"
        );
    }
    Ok(items)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
