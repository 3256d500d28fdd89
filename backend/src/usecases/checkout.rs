use std::{
    collections::HashSet,
    fmt,
    sync::{Arc, Mutex},
};

use anyhow::Result;
use async_trait::async_trait;
use axum::http::StatusCode;
use chrono::NaiveDate;
use crates::{
    domain::{
        entities::{
            payment_intents::{NewPaymentIntent, PaymentIntentEntity, PaymentIntentTransition},
            plans::PlanEntity,
        },
        repositories::{
            orders::OrderRepository, payment_intents::PaymentIntentRepository,
            plans::PlanRepository, subscriptions::SubscriptionRepository,
        },
        value_objects::{
            checkout::{
                AssignmentOutcome, CheckoutOutcome, CheckoutStart, CheckoutTicket, GatewayOrder,
                GatewayOrderRequest, OrderAssignment, PaymentVerification, SignedPaymentResponse,
            },
            enums::payment_intent_statuses::PaymentIntentStatus,
            money::{format_minor_units, to_minor_units},
            sessions::{AccessToken, Session},
        },
    },
    payments::payment_service_client::{GatewayOrderError, PaymentServiceClient},
};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::upgrades::{QuoteError, UpgradeQuoteUseCase};

/// Payment backend operations the checkout flow depends on.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait PaymentGateway {
    async fn create_order(
        &self,
        token: AccessToken,
        request: GatewayOrderRequest,
    ) -> Result<GatewayOrder>;
    async fn verify_payment(
        &self,
        token: AccessToken,
        signed: SignedPaymentResponse,
    ) -> Result<PaymentVerification>;
}

#[async_trait]
impl PaymentGateway for PaymentServiceClient {
    async fn create_order(
        &self,
        token: AccessToken,
        request: GatewayOrderRequest,
    ) -> Result<GatewayOrder> {
        PaymentServiceClient::create_order(self, &token, &request).await
    }

    async fn verify_payment(
        &self,
        token: AccessToken,
        signed: SignedPaymentResponse,
    ) -> Result<PaymentVerification> {
        PaymentServiceClient::verify_payment(self, &token, &signed).await
    }
}

/// The gateway's own checkout UI. `None` means the user closed it without paying.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait CheckoutWidget {
    async fn present(&self, ticket: CheckoutTicket) -> Result<Option<SignedPaymentResponse>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreconditionFailure {
    MissingCredential,
    MissingProfile,
}

impl fmt::Display for PreconditionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreconditionFailure::MissingCredential => f.write_str("sign in to continue"),
            PreconditionFailure::MissingProfile => {
                f.write_str("user profile could not be resolved; sign in again")
            }
        }
    }
}

fn rupees(minor: &i64) -> String {
    format!("₹{}", format_minor_units(*minor))
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("{0}")]
    Precondition(PreconditionFailure),
    #[error("plan {0} not found")]
    PlanNotFound(Uuid),
    #[error("a checkout for plan {plan_id} is already in progress")]
    CheckoutInProgress { plan_id: Uuid },
    #[error("nothing to charge for plan {0}; the upgrade credit covers the full price")]
    NothingToCharge(Uuid),
    #[error(
        "amount mismatch: requested {} but the payment backend confirmed {}",
        rupees(.requested_minor),
        rupees(.confirmed_minor)
    )]
    AmountMismatch {
        requested_minor: i64,
        confirmed_minor: i64,
    },
    #[error(transparent)]
    Quote(#[from] QuoteError),
    #[error("payment backend returned an unusable order: {0}")]
    MalformedGatewayOrder(#[source] GatewayOrderError),
    #[error("payment verification failed")]
    VerificationRejected { status: Option<String> },
    #[error("Order assignment failed")]
    OrderAssignmentFailed(#[source] anyhow::Error),
    #[error("Order assigned but subscription assignment failed: {reason}")]
    PartialAssignment {
        order: serde_json::Value,
        reason: String,
    },
    #[error("checkout {0} not found")]
    IntentNotFound(Uuid),
    #[error("checkout {intent_id} is {status}, not awaiting payment")]
    InvalidIntentState {
        intent_id: Uuid,
        status: PaymentIntentStatus,
    },
    #[error("signed payment does not belong to checkout {intent_id}")]
    GatewayOrderMismatch { intent_id: Uuid },
    #[error("payment service unavailable")]
    Transport(#[source] anyhow::Error),
    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

impl CheckoutError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CheckoutError::Precondition(_) => StatusCode::UNAUTHORIZED,
            CheckoutError::PlanNotFound(_) | CheckoutError::IntentNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            CheckoutError::CheckoutInProgress { .. }
            | CheckoutError::NothingToCharge(_)
            | CheckoutError::InvalidIntentState { .. }
            | CheckoutError::GatewayOrderMismatch { .. } => StatusCode::CONFLICT,
            CheckoutError::AmountMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            CheckoutError::Quote(inner) => inner.status_code(),
            CheckoutError::VerificationRejected { .. } => StatusCode::PAYMENT_REQUIRED,
            CheckoutError::MalformedGatewayOrder(_)
            | CheckoutError::OrderAssignmentFailed(_)
            | CheckoutError::PartialAssignment { .. }
            | CheckoutError::Transport(_) => StatusCode::BAD_GATEWAY,
            CheckoutError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            CheckoutError::Precondition(_) => "precondition",
            CheckoutError::PlanNotFound(_) | CheckoutError::IntentNotFound(_) => "not_found",
            CheckoutError::CheckoutInProgress { .. }
            | CheckoutError::NothingToCharge(_)
            | CheckoutError::InvalidIntentState { .. }
            | CheckoutError::GatewayOrderMismatch { .. } => "conflict",
            CheckoutError::AmountMismatch { .. } => "amount_mismatch",
            CheckoutError::Quote(inner) => inner.category(),
            CheckoutError::VerificationRejected { .. } => "verification_rejected",
            CheckoutError::PartialAssignment { .. } => "partial_assignment",
            CheckoutError::MalformedGatewayOrder(_)
            | CheckoutError::OrderAssignmentFailed(_)
            | CheckoutError::Transport(_) => "upstream",
            CheckoutError::Internal(_) => "internal",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub gateway_key_id: String,
}

/// (user, plan) pairs with a checkout step currently running in this process.
#[derive(Default, Clone)]
struct InFlightCheckouts {
    keys: Arc<Mutex<HashSet<(Uuid, Uuid)>>>,
}

struct InFlightGuard {
    keys: Arc<Mutex<HashSet<(Uuid, Uuid)>>>,
    key: (Uuid, Uuid),
}

impl InFlightCheckouts {
    fn claim(&self, user_id: Uuid, plan_id: Uuid) -> Option<InFlightGuard> {
        let mut keys = self
            .keys
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        keys.insert((user_id, plan_id)).then(|| InFlightGuard {
            keys: Arc::clone(&self.keys),
            key: (user_id, plan_id),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut keys = self
            .keys
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        keys.remove(&self.key);
    }
}

/// Caller identity required by every checkout step.
struct Buyer {
    token: AccessToken,
    user_id: Uuid,
}

fn buyer(session: &Session) -> Result<Buyer, CheckoutError> {
    let token = session
        .token()
        .ok_or(CheckoutError::Precondition(PreconditionFailure::MissingCredential))?;
    let user_id = session
        .user_id()
        .ok_or(CheckoutError::Precondition(PreconditionFailure::MissingProfile))?;

    Ok(Buyer {
        token: token.clone(),
        user_id,
    })
}

pub struct CheckoutUseCase<P, O, S, G>
where
    P: PlanRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    plan_repo: Arc<P>,
    order_repo: Arc<O>,
    subscription_repo: Arc<S>,
    intent_repo: Arc<dyn PaymentIntentRepository + Send + Sync>,
    gateway: Arc<G>,
    quotes: UpgradeQuoteUseCase<P, O>,
    settings: CheckoutSettings,
    in_flight: InFlightCheckouts,
}

impl<P, O, S, G> CheckoutUseCase<P, O, S, G>
where
    P: PlanRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    pub fn new(
        plan_repo: Arc<P>,
        order_repo: Arc<O>,
        subscription_repo: Arc<S>,
        intent_repo: Arc<dyn PaymentIntentRepository + Send + Sync>,
        gateway: Arc<G>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            quotes: UpgradeQuoteUseCase::new(Arc::clone(&plan_repo), Arc::clone(&order_repo)),
            plan_repo,
            order_repo,
            subscription_repo,
            intent_repo,
            gateway,
            settings,
            in_flight: InFlightCheckouts::default(),
        }
    }

    /// Prices the plan server-side and opens a gateway order for exactly that
    /// amount. Free plans are granted immediately.
    pub async fn start_checkout(
        &self,
        session: &Session,
        plan_id: Uuid,
        today: NaiveDate,
    ) -> Result<CheckoutStart, CheckoutError> {
        let buyer = buyer(session)?;
        let _guard = self
            .in_flight
            .claim(buyer.user_id, plan_id)
            .ok_or(CheckoutError::CheckoutInProgress { plan_id })?;

        let plan = self
            .plan_repo
            .find_by_id(plan_id)
            .await
            .map_err(|err| {
                error!(%plan_id, error = ?err, "checkout: failed to load plan");
                CheckoutError::Transport(err)
            })?
            .ok_or(CheckoutError::PlanNotFound(plan_id))?;

        if plan.is_free() {
            let outcome = self.assign_free_plan(&buyer, &plan).await?;
            return Ok(CheckoutStart::Assigned(outcome));
        }

        let quote = self.quotes.quote_for_plan(session, &plan, today).await?;
        if quote.adjusted_price <= Decimal::ZERO {
            warn!(user_id = %buyer.user_id, %plan_id, "checkout: credit covers the whole price");
            return Err(CheckoutError::NothingToCharge(plan_id));
        }

        let amount_in_paise =
            to_minor_units(quote.adjusted_price).map_err(CheckoutError::Internal)?;
        let request = GatewayOrderRequest {
            plan_id,
            amount: quote.adjusted_price,
            amount_in_paise,
            is_upgrade: quote.is_upgrade,
            credit_amount: quote.credit_applied,
        };

        let gateway_order = self
            .gateway
            .create_order(buyer.token.clone(), request)
            .await
            .map_err(|err| match err.downcast::<GatewayOrderError>() {
                Ok(malformed) => {
                    error!(%plan_id, error = %malformed, "checkout: payment backend returned a malformed order");
                    CheckoutError::MalformedGatewayOrder(malformed)
                }
                Err(err) => {
                    error!(%plan_id, error = ?err, "checkout: failed to create gateway order");
                    CheckoutError::Transport(err)
                }
            })?;

        let mut intent = NewPaymentIntent {
            user_id: buyer.user_id,
            plan_id,
            amount_minor: gateway_order.amount_minor,
            currency: gateway_order.currency.clone(),
            credit_applied: quote.credit_applied,
            is_upgrade: quote.is_upgrade,
            gateway_order_id: gateway_order.gateway_order_id.clone(),
            internal_payment_id: gateway_order.internal_payment_id.clone(),
            status: PaymentIntentStatus::Created,
            failure_reason: None,
        };

        if gateway_order.amount_minor != amount_in_paise {
            let mismatch = CheckoutError::AmountMismatch {
                requested_minor: amount_in_paise,
                confirmed_minor: gateway_order.amount_minor,
            };
            error!(
                user_id = %buyer.user_id,
                %plan_id,
                gateway_order_id = %gateway_order.gateway_order_id,
                requested_minor = amount_in_paise,
                confirmed_minor = gateway_order.amount_minor,
                "checkout: amount mismatch, checkout aborted"
            );

            intent.status = PaymentIntentStatus::Failed;
            intent.failure_reason = Some(mismatch.to_string());
            if let Err(err) = self.intent_repo.insert(intent).await {
                error!(error = ?err, "checkout: failed to record mismatched intent");
            }
            return Err(mismatch);
        }

        let intent = self
            .intent_repo
            .insert(intent)
            .await
            .map_err(CheckoutError::Internal)?;

        info!(
            user_id = %buyer.user_id,
            %plan_id,
            intent_id = %intent.id,
            amount_minor = intent.amount_minor,
            is_upgrade = intent.is_upgrade,
            "checkout: gateway order ready"
        );

        Ok(CheckoutStart::Gateway(CheckoutTicket {
            intent_id: intent.id,
            plan_id,
            plan_name: plan.name,
            gateway_order_id: intent.gateway_order_id,
            gateway_key_id: self.settings.gateway_key_id.clone(),
            amount_minor: intent.amount_minor,
            currency: intent.currency,
            credit_applied: intent.credit_applied,
            is_upgrade: intent.is_upgrade,
        }))
    }

    /// Verifies the signed gateway response, then assigns the order and the
    /// subscription in that order. The order side is never rolled back.
    pub async fn complete_checkout(
        &self,
        session: &Session,
        intent_id: Uuid,
        signed: SignedPaymentResponse,
    ) -> Result<AssignmentOutcome, CheckoutError> {
        let buyer = buyer(session)?;
        let intent = self.owned_intent(&buyer, intent_id).await?;

        if intent.status != PaymentIntentStatus::Created {
            return Err(CheckoutError::InvalidIntentState {
                intent_id,
                status: intent.status,
            });
        }
        if signed.razorpay_order_id != intent.gateway_order_id {
            warn!(%intent_id, "checkout: signed response names a different gateway order");
            return Err(CheckoutError::GatewayOrderMismatch { intent_id });
        }

        let _guard = self
            .in_flight
            .claim(buyer.user_id, intent.plan_id)
            .ok_or(CheckoutError::CheckoutInProgress {
                plan_id: intent.plan_id,
            })?;

        let verification = match self
            .gateway
            .verify_payment(buyer.token.clone(), signed.clone())
            .await
        {
            Ok(verification) => verification,
            Err(err) => match err.downcast::<GatewayOrderError>() {
                Ok(rejected) => {
                    self.mark(
                        &intent,
                        PaymentIntentStatus::Created,
                        PaymentIntentTransition::to(PaymentIntentStatus::Failed)
                            .with_failure(rejected.to_string()),
                    )
                    .await;
                    return Err(CheckoutError::VerificationRejected { status: None });
                }
                Err(err) => {
                    error!(%intent_id, error = ?err, "checkout: verification call failed");
                    return Err(CheckoutError::Transport(err));
                }
            },
        };

        if !verification.is_verified() {
            warn!(
                %intent_id,
                status = ?verification.status,
                eligible = ?verification.eligible_for_plan_assignment,
                "checkout: payment verification rejected"
            );
            self.mark(
                &intent,
                PaymentIntentStatus::Created,
                PaymentIntentTransition::to(PaymentIntentStatus::Failed)
                    .with_failure("payment verification failed"),
            )
            .await;
            return Err(CheckoutError::VerificationRejected {
                status: verification.status,
            });
        }

        let gateway_payment_id = verification
            .razorpay_payment_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| signed.razorpay_payment_id.clone());
        let internal_payment_id = verification
            .internal_payment_id
            .or_else(|| intent.internal_payment_id.clone());

        let verified = self
            .advance(
                &intent,
                PaymentIntentStatus::Created,
                PaymentIntentTransition::to(PaymentIntentStatus::Verified)
                    .with_payment_ids(Some(gateway_payment_id.clone()), internal_payment_id.clone()),
            )
            .await?;
        if !verified {
            return Err(CheckoutError::InvalidIntentState {
                intent_id,
                status: intent.status,
            });
        }

        let assignment = OrderAssignment {
            user_id: buyer.user_id,
            plan_id: intent.plan_id,
            gateway_payment_id,
            internal_payment_id,
        };
        let order = match self
            .order_repo
            .assign_order(buyer.token.clone(), assignment)
            .await
        {
            Ok(order) => order,
            Err(err) => {
                error!(%intent_id, error = ?err, "checkout: order assignment failed");
                self.mark(
                    &intent,
                    PaymentIntentStatus::Verified,
                    PaymentIntentTransition::to(PaymentIntentStatus::Failed)
                        .with_failure(format!("order assignment failed: {err}")),
                )
                .await;
                return Err(CheckoutError::OrderAssignmentFailed(err));
            }
        };

        let subscription = match self
            .subscription_repo
            .assign_subscription(buyer.token.clone(), buyer.user_id, intent.plan_id)
            .await
        {
            Ok(subscription) => subscription,
            Err(err) => {
                let reason = format!("subscription assignment failed: {err}");
                error!(
                    alert = "partial_assignment",
                    %intent_id,
                    user_id = %buyer.user_id,
                    plan_id = %intent.plan_id,
                    error = ?err,
                    "checkout: order assigned but subscription assignment failed, needs reconciliation"
                );
                self.mark(
                    &intent,
                    PaymentIntentStatus::Verified,
                    PaymentIntentTransition::to(PaymentIntentStatus::PartiallyAssigned)
                        .with_failure(reason.clone()),
                )
                .await;
                return Err(CheckoutError::PartialAssignment { order, reason });
            }
        };

        self.mark(
            &intent,
            PaymentIntentStatus::Verified,
            PaymentIntentTransition::to(PaymentIntentStatus::Assigned),
        )
        .await;

        info!(
            %intent_id,
            user_id = %buyer.user_id,
            plan_id = %intent.plan_id,
            "checkout: order and subscription assigned"
        );

        Ok(AssignmentOutcome::assigned(Some(intent_id), order, subscription))
    }

    /// The user closed the gateway widget. Entitlements are untouched.
    pub async fn dismiss_checkout(
        &self,
        session: &Session,
        intent_id: Uuid,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let buyer = buyer(session)?;
        let intent = self.owned_intent(&buyer, intent_id).await?;

        let dismissed = intent.status == PaymentIntentStatus::Created
            && self
                .advance(
                    &intent,
                    PaymentIntentStatus::Created,
                    PaymentIntentTransition::to(PaymentIntentStatus::Dismissed),
                )
                .await?;
        if !dismissed {
            return Err(CheckoutError::InvalidIntentState {
                intent_id,
                status: intent.status,
            });
        }

        info!(%intent_id, user_id = %buyer.user_id, "checkout: dismissed by user");
        Ok(CheckoutOutcome::Dismissed { intent_id })
    }

    /// Drives one checkout end to end through `widget`.
    pub async fn run_checkout<W>(
        &self,
        session: &Session,
        plan_id: Uuid,
        today: NaiveDate,
        widget: &W,
    ) -> Result<CheckoutOutcome, CheckoutError>
    where
        W: CheckoutWidget + Send + Sync,
    {
        let ticket = match self.start_checkout(session, plan_id, today).await? {
            CheckoutStart::Assigned(outcome) => return Ok(CheckoutOutcome::Assigned(outcome)),
            CheckoutStart::Gateway(ticket) => ticket,
        };
        let intent_id = ticket.intent_id;

        match widget.present(ticket).await {
            Ok(Some(signed)) => {
                let outcome = self.complete_checkout(session, intent_id, signed).await?;
                Ok(CheckoutOutcome::Assigned(outcome))
            }
            Ok(None) => self.dismiss_checkout(session, intent_id).await,
            Err(err) => {
                error!(%intent_id, error = ?err, "checkout: gateway widget failed");
                self.dismiss_checkout(session, intent_id).await?;
                Err(CheckoutError::Internal(err))
            }
        }
    }

    async fn assign_free_plan(
        &self,
        buyer: &Buyer,
        plan: &PlanEntity,
    ) -> Result<AssignmentOutcome, CheckoutError> {
        let order = self
            .order_repo
            .assign_free_order(buyer.token.clone(), buyer.user_id, plan.id)
            .await
            .map_err(|err| {
                error!(user_id = %buyer.user_id, plan_id = %plan.id, error = ?err, "checkout: free order assignment failed");
                CheckoutError::OrderAssignmentFailed(err)
            })?;

        let subscription = match self
            .subscription_repo
            .assign_free_subscription(buyer.token.clone(), buyer.user_id, plan.id)
            .await
        {
            Ok(subscription) => subscription,
            Err(err) => {
                error!(
                    alert = "partial_assignment",
                    user_id = %buyer.user_id,
                    plan_id = %plan.id,
                    error = ?err,
                    "checkout: free order assigned but subscription assignment failed"
                );
                return Err(CheckoutError::PartialAssignment {
                    order,
                    reason: format!("subscription assignment failed: {err}"),
                });
            }
        };

        info!(user_id = %buyer.user_id, plan_id = %plan.id, "checkout: free plan assigned");
        Ok(AssignmentOutcome::assigned(None, order, subscription))
    }

    async fn owned_intent(
        &self,
        buyer: &Buyer,
        intent_id: Uuid,
    ) -> Result<PaymentIntentEntity, CheckoutError> {
        self.intent_repo
            .find_by_id(intent_id)
            .await
            .map_err(CheckoutError::Internal)?
            .filter(|intent| intent.user_id == buyer.user_id)
            .ok_or(CheckoutError::IntentNotFound(intent_id))
    }

    /// Moves the intent from `expected` to the transition's status. `Ok(false)`
    /// means the intent was not in `expected`; store failures are errors.
    async fn advance(
        &self,
        intent: &PaymentIntentEntity,
        expected: PaymentIntentStatus,
        transition: PaymentIntentTransition,
    ) -> Result<bool, CheckoutError> {
        let next = transition.status;
        if !expected.can_transition_to(next) {
            error!(intent_id = %intent.id, from = %expected, to = %next, "checkout: illegal intent transition");
            return Ok(false);
        }

        match self.intent_repo.transition(intent.id, expected, transition).await {
            Ok(true) => Ok(true),
            Ok(false) => {
                warn!(intent_id = %intent.id, from = %expected, to = %next, "checkout: intent moved concurrently");
                Ok(false)
            }
            Err(err) => {
                error!(intent_id = %intent.id, to = %next, error = ?err, "checkout: failed to persist intent state");
                Err(CheckoutError::Internal(err))
            }
        }
    }

    /// Best-effort bookkeeping on paths that already report their own error.
    async fn mark(
        &self,
        intent: &PaymentIntentEntity,
        expected: PaymentIntentStatus,
        transition: PaymentIntentTransition,
    ) -> bool {
        matches!(self.advance(intent, expected, transition).await, Ok(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use crates::{
        domain::{
            entities::orders::OrderEntity,
            repositories::{
                orders::MockOrderRepository, payment_intents::MockPaymentIntentRepository,
                plans::MockPlanRepository, subscriptions::MockSubscriptionRepository,
            },
            value_objects::{
                enums::{plan_durations::PlanDuration, user_roles::UserRole},
                sessions::UserProfile,
            },
        },
        infra::memory::payment_intents::InMemoryPaymentIntentRepository,
    };
    use serde_json::json;

    fn plan(name: &str, total: i64, duration: PlanDuration) -> PlanEntity {
        PlanEntity {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            duration,
            total_price: Decimal::new(total, 0),
            discounted_price: None,
            discount_percentage: None,
            is_discount_active: false,
            features: vec![],
            is_active: true,
        }
    }

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    fn session_for(user_id: Uuid) -> Session {
        Session::authenticated(AccessToken::new("tok"), "rider@example.com", vec![UserRole::User])
            .with_profile(UserProfile {
                user_id,
                full_name: None,
                email: None,
                mobile: None,
                is_active: Some(true),
            })
    }

    /// Plan A (1000, monthly) bought 2024-01-01..2024-01-31; upgrading to plan B (2000).
    struct Scenario {
        user_id: Uuid,
        current: PlanEntity,
        target: PlanEntity,
        today: NaiveDate,
    }

    fn scenario() -> Scenario {
        Scenario {
            user_id: Uuid::new_v4(),
            current: plan("A", 1000, PlanDuration::Month),
            target: plan("B", 2000, PlanDuration::Month),
            today: date("2024-01-21"),
        }
    }

    fn plan_repo(plans: Vec<PlanEntity>) -> MockPlanRepository {
        let mut plan_repo = MockPlanRepository::new();
        plan_repo.expect_find_by_id().returning(move |plan_id| {
            let found = plans.iter().find(|plan| plan.id == plan_id).cloned();
            Box::pin(async move { Ok(found) })
        });
        plan_repo
    }

    fn order_repo_with_history(scenario: &Scenario) -> MockOrderRepository {
        let order = OrderEntity {
            id: Uuid::new_v4(),
            user_id: scenario.user_id,
            plan_id: scenario.current.id,
            plan_name: Some("A".to_string()),
            description: None,
            duration: PlanDuration::Month,
            user_name: None,
            created_at: NaiveDateTime::parse_from_str("2024-01-01 10:00:00", "%Y-%m-%d %H:%M:%S").ok(),
            start_date: Some(date("2024-01-01")),
            end_date: Some(date("2024-01-31")),
            is_active: true,
            total_price: Some(Decimal::new(1000, 0)),
            discounted_price: None,
            is_discount_active: Some(false),
            is_plan_active: Some(true),
            features: vec![],
        };
        let mut order_repo = MockOrderRepository::new();
        order_repo.expect_list_user_orders().returning(move |_, _| {
            let orders = vec![order.clone()];
            Box::pin(async move { Ok(orders) })
        });
        order_repo
    }

    fn gateway_confirming(amount_minor: i64) -> MockPaymentGateway {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_order()
            .withf(|_, request| request.amount_in_paise == 166667 && request.is_upgrade)
            .times(1)
            .returning(move |_, _| {
                Box::pin(async move {
                    Ok(GatewayOrder {
                        gateway_order_id: "order_abc".to_string(),
                        amount_minor,
                        currency: "INR".to_string(),
                        internal_payment_id: Some("42".to_string()),
                    })
                })
            });
        gateway
    }

    fn signed() -> SignedPaymentResponse {
        SignedPaymentResponse {
            razorpay_order_id: "order_abc".to_string(),
            razorpay_payment_id: "pay_xyz".to_string(),
            razorpay_signature: "sig".to_string(),
        }
    }

    fn verified() -> PaymentVerification {
        PaymentVerification {
            status: Some("success".to_string()),
            eligible_for_plan_assignment: Some(true),
            internal_payment_id: Some("42".to_string()),
            razorpay_payment_id: Some("pay_xyz".to_string()),
        }
    }

    fn settings() -> CheckoutSettings {
        CheckoutSettings {
            gateway_key_id: "rzp_test_key".to_string(),
        }
    }

    async fn stored_status(
        intents: &InMemoryPaymentIntentRepository,
        intent_id: Uuid,
    ) -> PaymentIntentStatus {
        intents.find_by_id(intent_id).await.unwrap().unwrap().status
    }

    #[tokio::test]
    async fn reconciled_amount_opens_gateway_checkout() {
        let scenario = scenario();
        let intents = Arc::new(InMemoryPaymentIntentRepository::new());
        let usecase = CheckoutUseCase::new(
            Arc::new(plan_repo(vec![scenario.current.clone(), scenario.target.clone()])),
            Arc::new(order_repo_with_history(&scenario)),
            Arc::new(MockSubscriptionRepository::new()),
            intents.clone(),
            Arc::new(gateway_confirming(166667)),
            settings(),
        );

        let start = usecase
            .start_checkout(&session_for(scenario.user_id), scenario.target.id, scenario.today)
            .await
            .unwrap();

        let CheckoutStart::Gateway(ticket) = start else {
            panic!("expected a gateway ticket");
        };
        assert_eq!(ticket.amount_minor, 166667);
        assert_eq!(ticket.credit_applied, Decimal::new(33333, 2));
        assert_eq!(ticket.gateway_key_id, "rzp_test_key");
        assert_eq!(
            stored_status(&intents, ticket.intent_id).await,
            PaymentIntentStatus::Created
        );
    }

    #[tokio::test]
    async fn server_amount_mismatch_aborts_and_names_both_amounts() {
        let scenario = scenario();
        let intents = Arc::new(InMemoryPaymentIntentRepository::new());
        let usecase = CheckoutUseCase::new(
            Arc::new(plan_repo(vec![scenario.current.clone(), scenario.target.clone()])),
            Arc::new(order_repo_with_history(&scenario)),
            Arc::new(MockSubscriptionRepository::new()),
            intents.clone(),
            Arc::new(gateway_confirming(170000)),
            settings(),
        );

        let err = usecase
            .start_checkout(&session_for(scenario.user_id), scenario.target.id, scenario.today)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::AmountMismatch {
                requested_minor: 166667,
                confirmed_minor: 170000
            }
        ));
        assert_eq!(err.category(), "amount_mismatch");
        let message = err.to_string();
        assert!(message.contains("1666.67"));
        assert!(message.contains("1700.00"));

        let failed = intents
            .list_by_status(PaymentIntentStatus::Failed, 10)
            .await
            .unwrap();
        assert_eq!(failed.len(), 1);
    }

    #[tokio::test]
    async fn malformed_gateway_order_is_fatal() {
        let scenario = scenario();
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_order().returning(|_, _| {
            Box::pin(async { Err(GatewayOrderError::NonNumericAmount("abc".to_string()).into()) })
        });
        let usecase = CheckoutUseCase::new(
            Arc::new(plan_repo(vec![scenario.current.clone(), scenario.target.clone()])),
            Arc::new(order_repo_with_history(&scenario)),
            Arc::new(MockSubscriptionRepository::new()),
            Arc::new(InMemoryPaymentIntentRepository::new()),
            Arc::new(gateway),
            settings(),
        );

        let err = usecase
            .start_checkout(&session_for(scenario.user_id), scenario.target.id, scenario.today)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::MalformedGatewayOrder(GatewayOrderError::NonNumericAmount(_))
        ));
    }

    #[tokio::test]
    async fn anonymous_session_cannot_start() {
        let usecase = CheckoutUseCase::new(
            Arc::new(MockPlanRepository::new()),
            Arc::new(MockOrderRepository::new()),
            Arc::new(MockSubscriptionRepository::new()),
            Arc::new(InMemoryPaymentIntentRepository::new()),
            Arc::new(MockPaymentGateway::new()),
            settings(),
        );

        let err = usecase
            .start_checkout(&Session::Anonymous, Uuid::new_v4(), date("2024-01-21"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::Precondition(PreconditionFailure::MissingCredential)
        ));
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn free_plan_skips_the_gateway() {
        let user_id = Uuid::new_v4();
        let free = plan("Starter", 0, PlanDuration::Month);

        let mut order_repo = MockOrderRepository::new();
        order_repo
            .expect_assign_free_order()
            .times(1)
            .returning(|_, _, _| Box::pin(async { Ok(json!({"orderId": 7})) }));
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_assign_free_subscription()
            .times(1)
            .returning(|_, _, _| Box::pin(async { Ok(json!({"subscriptionId": 9})) }));
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_order().never();

        let usecase = CheckoutUseCase::new(
            Arc::new(plan_repo(vec![free.clone()])),
            Arc::new(order_repo),
            Arc::new(subscription_repo),
            Arc::new(InMemoryPaymentIntentRepository::new()),
            Arc::new(gateway),
            settings(),
        );

        let start = usecase
            .start_checkout(&session_for(user_id), free.id, date("2024-01-21"))
            .await
            .unwrap();

        let CheckoutStart::Assigned(outcome) = start else {
            panic!("free plan should be assigned directly");
        };
        assert_eq!(outcome.status, "SUCCESS");
        assert_eq!(outcome.intent_id, None);
    }

    #[tokio::test]
    async fn free_plan_subscription_failure_is_partial() {
        let user_id = Uuid::new_v4();
        let free = plan("Starter", 0, PlanDuration::Month);

        let mut order_repo = MockOrderRepository::new();
        order_repo
            .expect_assign_free_order()
            .times(1)
            .returning(|_, _, _| Box::pin(async { Ok(json!({"orderId": 7})) }));
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_assign_free_subscription()
            .times(1)
            .returning(|_, _, _| Box::pin(async { Err(anyhow::anyhow!("usage manager returned 503")) }));
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_order().never();

        let usecase = CheckoutUseCase::new(
            Arc::new(plan_repo(vec![free.clone()])),
            Arc::new(order_repo),
            Arc::new(subscription_repo),
            Arc::new(InMemoryPaymentIntentRepository::new()),
            Arc::new(gateway),
            settings(),
        );

        let err = usecase
            .start_checkout(&session_for(user_id), free.id, date("2024-01-21"))
            .await
            .unwrap_err();

        assert_eq!(err.category(), "partial_assignment");
        let CheckoutError::PartialAssignment { order, reason } = err else {
            panic!("expected a partial assignment");
        };
        assert_eq!(order, json!({"orderId": 7}));
        assert!(reason.contains("503"));
    }

    #[tokio::test]
    async fn store_failure_while_verifying_is_internal() {
        let user_id = Uuid::new_v4();
        let intent = PaymentIntentEntity {
            id: Uuid::new_v4(),
            user_id,
            plan_id: Uuid::new_v4(),
            amount_minor: 166667,
            currency: "INR".to_string(),
            credit_applied: Decimal::new(33333, 2),
            is_upgrade: true,
            gateway_order_id: "order_abc".to_string(),
            internal_payment_id: Some("42".to_string()),
            gateway_payment_id: None,
            status: PaymentIntentStatus::Created,
            failure_reason: None,
            reconcile_attempts: 0,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let intent_id = intent.id;

        let mut intent_repo = MockPaymentIntentRepository::new();
        intent_repo.expect_find_by_id().returning(move |_| {
            let found = Some(intent.clone());
            Box::pin(async move { Ok(found) })
        });
        intent_repo
            .expect_transition()
            .returning(|_, _, _| Box::pin(async { Err(anyhow::anyhow!("connection pool timed out")) }));
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_verify_payment()
            .returning(|_, _| Box::pin(async { Ok(verified()) }));
        let mut order_repo = MockOrderRepository::new();
        order_repo.expect_assign_order().never();

        let usecase = CheckoutUseCase::new(
            Arc::new(MockPlanRepository::new()),
            Arc::new(order_repo),
            Arc::new(MockSubscriptionRepository::new()),
            Arc::new(intent_repo),
            Arc::new(gateway),
            settings(),
        );

        let err = usecase
            .complete_checkout(&session_for(user_id), intent_id, signed())
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::Internal(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    async fn started(
        usecase: &CheckoutUseCase<
            MockPlanRepository,
            MockOrderRepository,
            MockSubscriptionRepository,
            MockPaymentGateway,
        >,
        scenario: &Scenario,
    ) -> CheckoutTicket {
        match usecase
            .start_checkout(&session_for(scenario.user_id), scenario.target.id, scenario.today)
            .await
            .unwrap()
        {
            CheckoutStart::Gateway(ticket) => ticket,
            CheckoutStart::Assigned(_) => panic!("expected a gateway ticket"),
        }
    }

    #[tokio::test]
    async fn completed_checkout_assigns_order_then_subscription() {
        let scenario = scenario();
        let intents = Arc::new(InMemoryPaymentIntentRepository::new());

        let mut gateway = gateway_confirming(166667);
        gateway
            .expect_verify_payment()
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(verified()) }));
        let mut order_repo = order_repo_with_history(&scenario);
        order_repo
            .expect_assign_order()
            .withf(|_, assignment| {
                assignment.gateway_payment_id == "pay_xyz"
                    && assignment.internal_payment_id.as_deref() == Some("42")
            })
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(json!({"orderId": 1})) }));
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_assign_subscription()
            .times(1)
            .returning(|_, _, _| Box::pin(async { Ok(json!({"subscriptionId": 2})) }));

        let usecase = CheckoutUseCase::new(
            Arc::new(plan_repo(vec![scenario.current.clone(), scenario.target.clone()])),
            Arc::new(order_repo),
            Arc::new(subscription_repo),
            intents.clone(),
            Arc::new(gateway),
            settings(),
        );

        let ticket = started(&usecase, &scenario).await;
        let outcome = usecase
            .complete_checkout(&session_for(scenario.user_id), ticket.intent_id, signed())
            .await
            .unwrap();

        assert_eq!(outcome.message, "Order and Subscription assigned successfully.");
        assert_eq!(
            stored_status(&intents, ticket.intent_id).await,
            PaymentIntentStatus::Assigned
        );
    }

    #[tokio::test]
    async fn failed_order_assignment_leaves_subscription_untouched() {
        let scenario = scenario();
        let intents = Arc::new(InMemoryPaymentIntentRepository::new());

        let mut gateway = gateway_confirming(166667);
        gateway
            .expect_verify_payment()
            .returning(|_, _| Box::pin(async { Ok(verified()) }));
        let mut order_repo = order_repo_with_history(&scenario);
        order_repo
            .expect_assign_order()
            .returning(|_, _| Box::pin(async { Err(anyhow::anyhow!("order service returned 500")) }));
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo.expect_assign_subscription().never();

        let usecase = CheckoutUseCase::new(
            Arc::new(plan_repo(vec![scenario.current.clone(), scenario.target.clone()])),
            Arc::new(order_repo),
            Arc::new(subscription_repo),
            intents.clone(),
            Arc::new(gateway),
            settings(),
        );

        let ticket = started(&usecase, &scenario).await;
        let err = usecase
            .complete_checkout(&session_for(scenario.user_id), ticket.intent_id, signed())
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::OrderAssignmentFailed(_)));
        assert_eq!(err.to_string(), "Order assignment failed");
        assert_eq!(
            stored_status(&intents, ticket.intent_id).await,
            PaymentIntentStatus::Failed
        );
    }

    #[tokio::test]
    async fn subscription_failure_is_reported_as_partial() {
        let scenario = scenario();
        let intents = Arc::new(InMemoryPaymentIntentRepository::new());

        let mut gateway = gateway_confirming(166667);
        gateway
            .expect_verify_payment()
            .returning(|_, _| Box::pin(async { Ok(verified()) }));
        let mut order_repo = order_repo_with_history(&scenario);
        order_repo
            .expect_assign_order()
            .returning(|_, _| Box::pin(async { Ok(json!({"orderId": 1})) }));
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_assign_subscription()
            .returning(|_, _, _| Box::pin(async { Err(anyhow::anyhow!("timeout")) }));

        let usecase = CheckoutUseCase::new(
            Arc::new(plan_repo(vec![scenario.current.clone(), scenario.target.clone()])),
            Arc::new(order_repo),
            Arc::new(subscription_repo),
            intents.clone(),
            Arc::new(gateway),
            settings(),
        );

        let ticket = started(&usecase, &scenario).await;
        let err = usecase
            .complete_checkout(&session_for(scenario.user_id), ticket.intent_id, signed())
            .await
            .unwrap_err();

        assert_eq!(err.category(), "partial_assignment");
        let CheckoutError::PartialAssignment { order, .. } = err else {
            panic!("expected a partial assignment");
        };
        assert_eq!(order, json!({"orderId": 1}));
        assert_eq!(
            stored_status(&intents, ticket.intent_id).await,
            PaymentIntentStatus::PartiallyAssigned
        );
    }

    #[tokio::test]
    async fn rejected_verification_fails_the_intent() {
        let scenario = scenario();
        let intents = Arc::new(InMemoryPaymentIntentRepository::new());

        let mut gateway = gateway_confirming(166667);
        gateway.expect_verify_payment().returning(|_, _| {
            Box::pin(async {
                Ok(PaymentVerification {
                    status: Some("SUCCESS".to_string()),
                    eligible_for_plan_assignment: Some(false),
                    internal_payment_id: None,
                    razorpay_payment_id: None,
                })
            })
        });
        let mut order_repo = order_repo_with_history(&scenario);
        order_repo.expect_assign_order().never();

        let usecase = CheckoutUseCase::new(
            Arc::new(plan_repo(vec![scenario.current.clone(), scenario.target.clone()])),
            Arc::new(order_repo),
            Arc::new(MockSubscriptionRepository::new()),
            intents.clone(),
            Arc::new(gateway),
            settings(),
        );

        let ticket = started(&usecase, &scenario).await;
        let err = usecase
            .complete_checkout(&session_for(scenario.user_id), ticket.intent_id, signed())
            .await
            .unwrap_err();

        assert_eq!(err.category(), "verification_rejected");
        assert_eq!(
            stored_status(&intents, ticket.intent_id).await,
            PaymentIntentStatus::Failed
        );
    }

    #[tokio::test]
    async fn verification_transport_failure_keeps_intent_retryable() {
        let scenario = scenario();
        let intents = Arc::new(InMemoryPaymentIntentRepository::new());

        let mut gateway = gateway_confirming(166667);
        gateway
            .expect_verify_payment()
            .returning(|_, _| Box::pin(async { Err(anyhow::anyhow!("connection reset")) }));

        let usecase = CheckoutUseCase::new(
            Arc::new(plan_repo(vec![scenario.current.clone(), scenario.target.clone()])),
            Arc::new(order_repo_with_history(&scenario)),
            Arc::new(MockSubscriptionRepository::new()),
            intents.clone(),
            Arc::new(gateway),
            settings(),
        );

        let ticket = started(&usecase, &scenario).await;
        let err = usecase
            .complete_checkout(&session_for(scenario.user_id), ticket.intent_id, signed())
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::Transport(_)));
        assert_eq!(
            stored_status(&intents, ticket.intent_id).await,
            PaymentIntentStatus::Created
        );
    }

    #[tokio::test]
    async fn other_users_cannot_complete_an_intent() {
        let scenario = scenario();
        let usecase = CheckoutUseCase::new(
            Arc::new(plan_repo(vec![scenario.current.clone(), scenario.target.clone()])),
            Arc::new(order_repo_with_history(&scenario)),
            Arc::new(MockSubscriptionRepository::new()),
            Arc::new(InMemoryPaymentIntentRepository::new()),
            Arc::new(gateway_confirming(166667)),
            settings(),
        );

        let ticket = started(&usecase, &scenario).await;
        let err = usecase
            .complete_checkout(&session_for(Uuid::new_v4()), ticket.intent_id, signed())
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::IntentNotFound(_)));
    }

    #[tokio::test]
    async fn dismissed_widget_changes_no_entitlement() {
        let scenario = scenario();
        let intents = Arc::new(InMemoryPaymentIntentRepository::new());
        let mut order_repo = order_repo_with_history(&scenario);
        order_repo.expect_assign_order().never();
        let mut widget = MockCheckoutWidget::new();
        widget
            .expect_present()
            .withf(|ticket| ticket.amount_minor == 166667)
            .returning(|_| Box::pin(async { Ok(None) }));

        let usecase = CheckoutUseCase::new(
            Arc::new(plan_repo(vec![scenario.current.clone(), scenario.target.clone()])),
            Arc::new(order_repo),
            Arc::new(MockSubscriptionRepository::new()),
            intents.clone(),
            Arc::new(gateway_confirming(166667)),
            settings(),
        );

        let outcome = usecase
            .run_checkout(
                &session_for(scenario.user_id),
                scenario.target.id,
                scenario.today,
                &widget,
            )
            .await
            .unwrap();

        let CheckoutOutcome::Dismissed { intent_id } = outcome else {
            panic!("expected a dismissal");
        };
        assert_eq!(
            stored_status(&intents, intent_id).await,
            PaymentIntentStatus::Dismissed
        );
    }

    #[tokio::test]
    async fn run_checkout_completes_through_the_widget() {
        let scenario = scenario();
        let mut gateway = gateway_confirming(166667);
        gateway
            .expect_verify_payment()
            .returning(|_, _| Box::pin(async { Ok(verified()) }));
        let mut order_repo = order_repo_with_history(&scenario);
        order_repo
            .expect_assign_order()
            .returning(|_, _| Box::pin(async { Ok(json!({"orderId": 1})) }));
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_assign_subscription()
            .returning(|_, _, _| Box::pin(async { Ok(json!({"subscriptionId": 2})) }));
        let mut widget = MockCheckoutWidget::new();
        widget
            .expect_present()
            .returning(|_| Box::pin(async { Ok(Some(signed())) }));

        let usecase = CheckoutUseCase::new(
            Arc::new(plan_repo(vec![scenario.current.clone(), scenario.target.clone()])),
            Arc::new(order_repo),
            Arc::new(subscription_repo),
            Arc::new(InMemoryPaymentIntentRepository::new()),
            Arc::new(gateway),
            settings(),
        );

        let outcome = usecase
            .run_checkout(
                &session_for(scenario.user_id),
                scenario.target.id,
                scenario.today,
                &widget,
            )
            .await
            .unwrap();

        assert!(matches!(outcome, CheckoutOutcome::Assigned(_)));
    }

    #[test]
    fn in_flight_guard_blocks_duplicates_until_dropped() {
        let in_flight = InFlightCheckouts::default();
        let user_id = Uuid::new_v4();
        let plan_id = Uuid::new_v4();

        let guard = in_flight.claim(user_id, plan_id);
        assert!(guard.is_some());
        assert!(in_flight.claim(user_id, plan_id).is_none());
        assert!(in_flight.claim(user_id, Uuid::new_v4()).is_some());

        drop(guard);
        assert!(in_flight.claim(user_id, plan_id).is_some());
    }
}
