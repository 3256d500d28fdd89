pub mod auth;
pub mod checkout;
pub mod order_reports;
pub mod plan_catalog;
pub mod upgrades;
