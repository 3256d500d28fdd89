use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{default_true, features::FeatureEntity, null_as_default, null_as_true};
use crate::domain::value_objects::enums::plan_durations::PlanDuration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanEntity {
    #[serde(rename = "planId", alias = "id")]
    pub id: Uuid,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub duration: PlanDuration,
    pub total_price: Decimal,
    #[serde(default)]
    pub discounted_price: Option<Decimal>,
    #[serde(default)]
    pub discount_percentage: Option<Decimal>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_discount_active: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub features: Vec<FeatureEntity>,
    #[serde(default = "default_true", deserialize_with = "null_as_true")]
    pub is_active: bool,
}

impl PlanEntity {
    /// Catalog price: the discount only counts when it actually undercuts the list price.
    pub fn effective_price(&self) -> Decimal {
        match self.discounted_price {
            Some(discounted) if self.is_discount_active && discounted < self.total_price => {
                discounted
            }
            _ => self.total_price,
        }
    }

    /// Price an upgrade quote starts from: an active, non-zero discount wins.
    pub fn upgrade_base_price(&self) -> Decimal {
        match self.discounted_price {
            Some(discounted) if self.is_discount_active && discounted > Decimal::ZERO => {
                discounted
            }
            _ => self.total_price,
        }
    }

    pub fn is_free(&self) -> bool {
        self.total_price.is_zero()
    }
}
