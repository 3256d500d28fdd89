use std::cmp::Ordering;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use super::{enums::plan_durations::PlanDuration, money::round_currency};
use crate::domain::entities::{orders::OrderEntity, plans::PlanEntity};

/// Remaining value of a user's current term.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct UnusedCredit {
    pub days_left: i64,
    pub total_duration_days: i64,
    pub amount: Decimal,
}

impl UnusedCredit {
    pub fn none() -> Self {
        Self {
            days_left: 0,
            total_duration_days: 0,
            amount: Decimal::ZERO,
        }
    }
}

/// Most recent order by creation time; ties go to the greater order id so
/// the pick is stable across calls. Orders without a creation time sort last.
pub fn most_recent_order(orders: &[OrderEntity]) -> Option<&OrderEntity> {
    orders.iter().max_by(|left, right| {
        match (left.created_at, right.created_at) {
            (Some(l), Some(r)) => l.cmp(&r),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| left.id.cmp(&right.id))
    })
}

/// Whole UTC days until the term ends, never negative. No end date means no credit.
pub fn days_left(end_date: Option<NaiveDate>, today: NaiveDate) -> i64 {
    end_date
        .map(|end| (end - today).num_days().max(0))
        .unwrap_or(0)
}

pub fn total_duration_days(
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    duration: &PlanDuration,
) -> i64 {
    match (start_date, end_date) {
        (Some(start), Some(end)) if end > start => (end - start).num_days(),
        _ => duration.nominal_days(),
    }
}

/// Prorated credit, clamped to `[0, basis]` and rounded to currency precision.
pub fn prorated_credit(days_left: i64, total_duration_days: i64, basis: Decimal) -> Decimal {
    if total_duration_days <= 0 || days_left <= 0 || basis <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let raw = Decimal::from(days_left) * basis / Decimal::from(total_duration_days);
    round_currency(raw.min(basis))
}

/// Credit earned by the unused part of `order`, valued at `plan`'s upgrade base price.
pub fn unused_credit(order: &OrderEntity, plan: &PlanEntity, today: NaiveDate) -> UnusedCredit {
    let duration = match &order.duration {
        PlanDuration::Other(raw) if raw.is_empty() => &plan.duration,
        duration => duration,
    };
    let days_left = days_left(order.end_date, today);
    let total_duration_days = total_duration_days(order.term_start(), order.end_date, duration);

    UnusedCredit {
        days_left,
        total_duration_days,
        amount: prorated_credit(days_left, total_duration_days, plan.upgrade_base_price()),
    }
}

/// Upgrades must cost strictly more than the current plan; lateral moves are excluded.
pub fn is_upgrade_target(candidate: &PlanEntity, current: &PlanEntity) -> bool {
    candidate.total_price > current.total_price
}

pub fn adjusted_price(base_price: Decimal, credit: Decimal) -> Decimal {
    round_currency((base_price - credit).max(Decimal::ZERO))
}
