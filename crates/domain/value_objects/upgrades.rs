use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::{credits::UnusedCredit, plans::PlanView};

/// Server-issued price for buying one plan right now.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlanQuote {
    pub plan: PlanView,
    pub base_price: Decimal,
    pub credit_applied: Decimal,
    pub adjusted_price: Decimal,
    pub is_upgrade: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CurrentTerm {
    pub order_id: Uuid,
    pub plan: PlanView,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub credit: UnusedCredit,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UpgradeOptions {
    pub current: Option<CurrentTerm>,
    pub candidates: Vec<PlanQuote>,
}
