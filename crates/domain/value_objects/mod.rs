pub mod calendar;
pub mod checkout;
pub mod credits;
pub mod enums;
pub mod money;
pub mod order_reports;
pub mod plans;
pub mod sessions;
pub mod upgrades;
