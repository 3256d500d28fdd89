use anyhow::Result;
use crates::domain::{
    entities::payment_intents::{PaymentIntentEntity, PaymentIntentTransition},
    repositories::{
        payment_intents::PaymentIntentRepository, subscriptions::SubscriptionRepository,
    },
    value_objects::{enums::payment_intent_statuses::PaymentIntentStatus, sessions::AccessToken},
};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct ReconcileParams {
    pub max_attempts: i32,
    pub batch_size: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub scanned: usize,
    pub already_active: usize,
    pub reassigned: usize,
    pub failed: usize,
}

/// Finishes checkouts whose order was assigned but whose subscription was
/// not. Only the subscription side is retried; orders are never rolled back.
pub struct ReconcilePartialAssignmentsUseCase {
    intent_repo: Arc<dyn PaymentIntentRepository + Send + Sync>,
    subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
    service_token: AccessToken,
    params: ReconcileParams,
}

enum Attempt {
    AlreadyActive,
    Reassigned,
    Failed,
}

impl ReconcilePartialAssignmentsUseCase {
    pub fn new(
        intent_repo: Arc<dyn PaymentIntentRepository + Send + Sync>,
        subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
        service_token: AccessToken,
        params: ReconcileParams,
    ) -> Self {
        Self {
            intent_repo,
            subscription_repo,
            service_token,
            params,
        }
    }

    /// One pass over the partially assigned intents that still have attempts
    /// left, one attempt each. Exhausted intents are left for manual handling.
    pub async fn run(&self) -> Result<ReconcileReport> {
        let intents = self
            .intent_repo
            .list_reconcilable(self.params.max_attempts, self.params.batch_size)
            .await?;

        let mut report = ReconcileReport {
            scanned: intents.len(),
            ..Default::default()
        };

        for intent in intents {
            match self.reconcile(&intent).await {
                Attempt::AlreadyActive => report.already_active += 1,
                Attempt::Reassigned => report.reassigned += 1,
                Attempt::Failed => report.failed += 1,
            }
        }

        Ok(report)
    }

    async fn reconcile(&self, intent: &PaymentIntentEntity) -> Attempt {
        let subscriptions = match self
            .subscription_repo
            .list_user_subscriptions(self.service_token.clone(), intent.user_id)
            .await
        {
            Ok(subscriptions) => subscriptions,
            Err(err) => {
                self.record_failure(intent, format!("subscription lookup failed: {err}"))
                    .await;
                return Attempt::Failed;
            }
        };

        let already_active = subscriptions
            .iter()
            .any(|subscription| subscription.plan_id == intent.plan_id && subscription.is_active);
        if already_active {
            info!(
                intent_id = %intent.id,
                user_id = %intent.user_id,
                plan_id = %intent.plan_id,
                "reconcile: subscription already active"
            );
            self.mark_assigned(intent).await;
            return Attempt::AlreadyActive;
        }

        match self
            .subscription_repo
            .assign_subscription(self.service_token.clone(), intent.user_id, intent.plan_id)
            .await
        {
            Ok(_) => {
                info!(
                    intent_id = %intent.id,
                    user_id = %intent.user_id,
                    plan_id = %intent.plan_id,
                    "reconcile: subscription assigned"
                );
                self.mark_assigned(intent).await;
                Attempt::Reassigned
            }
            Err(err) => {
                self.record_failure(intent, format!("subscription assignment failed: {err}"))
                    .await;
                Attempt::Failed
            }
        }
    }

    async fn mark_assigned(&self, intent: &PaymentIntentEntity) {
        match self
            .intent_repo
            .transition(
                intent.id,
                PaymentIntentStatus::PartiallyAssigned,
                PaymentIntentTransition::to(PaymentIntentStatus::Assigned),
            )
            .await
        {
            Ok(true) => {}
            Ok(false) => warn!(intent_id = %intent.id, "reconcile: intent moved concurrently"),
            Err(err) => {
                error!(intent_id = %intent.id, error = ?err, "reconcile: failed to mark intent assigned")
            }
        }
    }

    async fn record_failure(&self, intent: &PaymentIntentEntity, reason: String) {
        error!(
            intent_id = %intent.id,
            user_id = %intent.user_id,
            plan_id = %intent.plan_id,
            reason = %reason,
            "reconcile: attempt failed"
        );

        match self
            .intent_repo
            .record_reconcile_attempt(intent.id, reason)
            .await
        {
            Ok(attempts) if attempts >= self.params.max_attempts => error!(
                alert = "reconcile_exhausted",
                intent_id = %intent.id,
                user_id = %intent.user_id,
                plan_id = %intent.plan_id,
                attempts,
                "reconcile: giving up, manual handling required"
            ),
            Ok(_) => {}
            Err(err) => {
                error!(intent_id = %intent.id, error = ?err, "reconcile: failed to record attempt")
            }
        }
    }
}
