pub mod orders;
pub mod payment_intents;
pub mod plans;
pub mod subscriptions;
pub mod users;
