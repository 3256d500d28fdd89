use anyhow::{Result, anyhow};
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};

/// Rounds to currency precision (two places, halves away from zero).
pub fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Major units to the integer minor units the payment gateway speaks (paise).
pub fn to_minor_units(value: Decimal) -> Result<i64> {
    (value * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| anyhow!("amount {value} does not fit in minor units"))
}

pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

/// Renders minor units as a major amount with two decimals, e.g. `1700.00`.
pub fn format_minor_units(minor: i64) -> String {
    format!("{:.2}", from_minor_units(minor))
}
