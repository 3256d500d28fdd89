use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::plan_durations::PlanDuration;
use crate::domain::entities::{features::FeatureEntity, plans::PlanEntity};

/// Catalog entry as exposed to callers, carrying the derived price and label.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlanView {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub duration: PlanDuration,
    pub duration_label: &'static str,
    pub total_price: Decimal,
    pub discounted_price: Option<Decimal>,
    pub discount_percentage: Option<Decimal>,
    pub is_discount_active: bool,
    pub effective_price: Decimal,
    pub features: Vec<FeatureEntity>,
    pub is_active: bool,
}

impl From<PlanEntity> for PlanView {
    fn from(value: PlanEntity) -> Self {
        let effective_price = value.effective_price();
        let duration_label = value.duration.label();

        Self {
            id: value.id,
            name: value.name,
            description: value.description,
            duration: value.duration,
            duration_label,
            total_price: value.total_price,
            discounted_price: value.discounted_price,
            discount_percentage: value.discount_percentage,
            is_discount_active: value.is_discount_active,
            effective_price,
            features: value.features,
            is_active: value.is_active,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlanCatalogFilter {
    pub name: Option<String>,
    pub duration: Option<String>,
}

impl PlanCatalogFilter {
    pub fn matches(&self, plan: &PlanEntity) -> bool {
        let name_ok = self
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .is_none_or(|name| plan.name.eq_ignore_ascii_case(name));

        let duration_ok = self
            .duration
            .as_deref()
            .map(str::trim)
            .filter(|duration| !duration.is_empty())
            .is_none_or(|duration| {
                plan.duration
                    .label()
                    .to_ascii_lowercase()
                    .contains(&duration.to_ascii_lowercase())
            });

        name_ok && duration_ok
    }
}
