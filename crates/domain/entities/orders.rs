use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{features::FeatureEntity, null_as_default};
use crate::domain::value_objects::{
    calendar::{lenient_date, lenient_timestamp},
    enums::plan_durations::PlanDuration,
};

/// Order-side entitlement record. Prices are a snapshot taken at purchase
/// time and are independent of the plan's current price.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    #[serde(default)]
    pub plan_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub duration: PlanDuration,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default, with = "lenient_timestamp")]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default, with = "lenient_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, with = "lenient_date")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_active: bool,
    #[serde(default)]
    pub total_price: Option<Decimal>,
    #[serde(default)]
    pub discounted_price: Option<Decimal>,
    #[serde(default)]
    pub is_discount_active: Option<bool>,
    #[serde(default)]
    pub is_plan_active: Option<bool>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub features: Vec<FeatureEntity>,
}

impl OrderEntity {
    /// Term start; orders created before start dates were recorded fall back to creation time.
    pub fn term_start(&self) -> Option<NaiveDate> {
        self.start_date
            .or_else(|| self.created_at.map(|created_at| created_at.date()))
    }
}
