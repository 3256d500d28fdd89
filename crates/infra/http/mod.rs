pub mod orders;
pub mod plans;
pub mod service_client;
pub mod subscriptions;
pub mod users;
