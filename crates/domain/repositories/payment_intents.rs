use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::payment_intents::{NewPaymentIntent, PaymentIntentEntity, PaymentIntentTransition},
    value_objects::enums::payment_intent_statuses::PaymentIntentStatus,
};

#[async_trait]
#[automock]
pub trait PaymentIntentRepository {
    async fn insert(&self, intent: NewPaymentIntent) -> Result<PaymentIntentEntity>;
    async fn find_by_id(&self, intent_id: Uuid) -> Result<Option<PaymentIntentEntity>>;
    /// Applies `transition` only while the intent is still in `expected`.
    /// Returns `false` when another request moved it first.
    async fn transition(
        &self,
        intent_id: Uuid,
        expected: PaymentIntentStatus,
        transition: PaymentIntentTransition,
    ) -> Result<bool>;
    async fn list_by_status(
        &self,
        status: PaymentIntentStatus,
        limit: i64,
    ) -> Result<Vec<PaymentIntentEntity>>;
    /// Partially assigned intents with fewer than `max_attempts` reconcile
    /// attempts, least recently touched first.
    async fn list_reconcilable(
        &self,
        max_attempts: i32,
        limit: i64,
    ) -> Result<Vec<PaymentIntentEntity>>;
    /// Bumps the reconcile counter and records the latest failure; returns the new count.
    async fn record_reconcile_attempt(&self, intent_id: Uuid, failure_reason: String) -> Result<i32>;
}
