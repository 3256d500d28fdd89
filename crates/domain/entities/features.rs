use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{default_true, null_as_default, null_as_true};

/// Meterable capability bundled into a plan. Treated as an immutable snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeatureEntity {
    #[serde(rename = "featureId", alias = "id")]
    pub id: Uuid,
    #[serde(default, deserialize_with = "null_as_default")]
    pub code: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub usage_limit: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub price_per_unit: Decimal,
    #[serde(default, deserialize_with = "null_as_default")]
    pub default_included_units: u32,
    #[serde(default = "default_true", deserialize_with = "null_as_true")]
    pub is_active: bool,
}
