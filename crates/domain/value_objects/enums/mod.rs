pub mod payment_intent_statuses;
pub mod plan_durations;
pub mod user_roles;
