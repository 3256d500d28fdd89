pub mod admin_orders;
pub mod auth;
pub mod checkout;
pub mod plans;
pub mod upgrades;
