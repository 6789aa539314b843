use serde::{Deserialize, Serialize};
use validator::Validate;

use super::lenient;
use super::{not_blank, EntityKind, Resource};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    #[serde(deserialize_with = "lenient::id")]
    pub id: String,
    #[serde(default, alias = "first_name", alias = "prenom", deserialize_with = "lenient::string_or_empty")]
    pub first_name: String,
    #[serde(default, alias = "last_name", alias = "nom", deserialize_with = "lenient::string_or_empty")]
    pub last_name: String,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub phone: Option<String>,
    #[serde(default, alias = "poste", deserialize_with = "lenient::opt_string")]
    pub role: Option<String>,
    #[serde(default, alias = "salaire", deserialize_with = "lenient::opt_f64")]
    pub salary: Option<f64>,
    #[serde(default, alias = "created_at", deserialize_with = "lenient::opt_string")]
    pub created_at: Option<String>,
    #[serde(default, alias = "updated_at", deserialize_with = "lenient::opt_string")]
    pub updated_at: Option<String>,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeDraft {
    #[validate(required, custom = "not_blank")]
    #[serde(
        default,
        alias = "first_name",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub first_name: Option<String>,
    #[validate(required, custom = "not_blank")]
    #[serde(
        default,
        alias = "last_name",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub role: Option<String>,
    #[validate(range(min = 0.0))]
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_f64")]
    pub salary: Option<f64>,
}

impl Resource for Employee {
    type Draft = EmployeeDraft;
    const KIND: EntityKind = EntityKind::Employees;

    fn search_text(&self) -> String {
        format!(
            "{} {} {}",
            self.full_name(),
            self.phone.as_deref().unwrap_or_default(),
            self.role.as_deref().unwrap_or_default()
        )
        .to_lowercase()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    #[serde(deserialize_with = "lenient::id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub address: Option<String>,
    #[serde(default, alias = "created_at", deserialize_with = "lenient::opt_string")]
    pub created_at: Option<String>,
    #[serde(default, alias = "updated_at", deserialize_with = "lenient::opt_string")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SupplierDraft {
    #[validate(required, custom = "not_blank")]
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub phone: Option<String>,
    #[validate(email)]
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub address: Option<String>,
}

impl Resource for Supplier {
    type Draft = SupplierDraft;
    const KIND: EntityKind = EntityKind::Suppliers;

    fn search_text(&self) -> String {
        format!(
            "{} {} {}",
            self.name,
            self.phone.as_deref().unwrap_or_default(),
            self.email.as_deref().unwrap_or_default()
        )
        .to_lowercase()
    }
}
