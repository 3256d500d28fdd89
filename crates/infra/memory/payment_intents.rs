use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    entities::payment_intents::{NewPaymentIntent, PaymentIntentEntity, PaymentIntentTransition},
    repositories::payment_intents::PaymentIntentRepository,
    value_objects::enums::payment_intent_statuses::PaymentIntentStatus,
};

/// Process-local intent store for deployments without a database. Intents
/// do not survive a restart, so partial assignments are only visible in logs.
#[derive(Default)]
pub struct InMemoryPaymentIntentRepository {
    intents: RwLock<HashMap<Uuid, PaymentIntentEntity>>,
}

impl InMemoryPaymentIntentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentIntentRepository for InMemoryPaymentIntentRepository {
    async fn insert(&self, intent: NewPaymentIntent) -> Result<PaymentIntentEntity> {
        let now = Utc::now();
        let entity = PaymentIntentEntity {
            id: Uuid::new_v4(),
            user_id: intent.user_id,
            plan_id: intent.plan_id,
            amount_minor: intent.amount_minor,
            currency: intent.currency,
            credit_applied: intent.credit_applied,
            is_upgrade: intent.is_upgrade,
            gateway_order_id: intent.gateway_order_id,
            internal_payment_id: intent.internal_payment_id,
            gateway_payment_id: None,
            status: intent.status,
            failure_reason: intent.failure_reason,
            reconcile_attempts: 0,
            created_at: now,
            updated_at: now,
        };

        self.intents.write().await.insert(entity.id, entity.clone());
        Ok(entity)
    }

    async fn find_by_id(&self, intent_id: Uuid) -> Result<Option<PaymentIntentEntity>> {
        Ok(self.intents.read().await.get(&intent_id).cloned())
    }

    async fn transition(
        &self,
        intent_id: Uuid,
        expected: PaymentIntentStatus,
        transition: PaymentIntentTransition,
    ) -> Result<bool> {
        let mut intents = self.intents.write().await;
        let Some(intent) = intents
            .get_mut(&intent_id)
            .filter(|intent| intent.status == expected)
        else {
            return Ok(false);
        };

        intent.status = transition.status;
        if transition.gateway_payment_id.is_some() {
            intent.gateway_payment_id = transition.gateway_payment_id;
        }
        if transition.internal_payment_id.is_some() {
            intent.internal_payment_id = transition.internal_payment_id;
        }
        if transition.failure_reason.is_some() {
            intent.failure_reason = transition.failure_reason;
        }
        intent.updated_at = Utc::now();

        Ok(true)
    }

    async fn list_by_status(
        &self,
        status: PaymentIntentStatus,
        limit: i64,
    ) -> Result<Vec<PaymentIntentEntity>> {
        let mut matching: Vec<_> = self
            .intents
            .read()
            .await
            .values()
            .filter(|intent| intent.status == status)
            .cloned()
            .collect();
        matching.sort_by_key(|intent| intent.updated_at);
        matching.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(matching)
    }

    async fn list_reconcilable(
        &self,
        max_attempts: i32,
        limit: i64,
    ) -> Result<Vec<PaymentIntentEntity>> {
        let mut matching: Vec<_> = self
            .intents
            .read()
            .await
            .values()
            .filter(|intent| {
                intent.status == PaymentIntentStatus::PartiallyAssigned
                    && intent.reconcile_attempts < max_attempts
            })
            .cloned()
            .collect();
        matching.sort_by_key(|intent| intent.updated_at);
        matching.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(matching)
    }

    async fn record_reconcile_attempt(&self, intent_id: Uuid, failure_reason: String) -> Result<i32> {
        let mut intents = self.intents.write().await;
        let intent = intents
            .get_mut(&intent_id)
            .ok_or_else(|| anyhow::anyhow!("payment intent {intent_id} not found"))?;

        intent.reconcile_attempts += 1;
        intent.failure_reason = Some(failure_reason);
        intent.updated_at = Utc::now();
        Ok(intent.reconcile_attempts)
    }
}
