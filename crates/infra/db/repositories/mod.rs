pub mod payment_intents;
