use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use crates::domain::{
    repositories::{
        orders::OrderRepository, payment_intents::PaymentIntentRepository,
        plans::PlanRepository, subscriptions::SubscriptionRepository,
    },
    value_objects::{
        calendar::utc_today,
        checkout::{CheckoutOutcome, CheckoutStart, SignedPaymentResponse},
    },
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::RequiredSession,
    axum_http::error_responses::AppError,
    usecases::checkout::{CheckoutSettings, CheckoutUseCase, PaymentGateway},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCheckoutRequest {
    pub plan_id: Uuid,
}

/// Collaborators of the checkout flow, wired once by the server.
pub struct CheckoutDeps<P, O, S, G> {
    pub plan_repo: Arc<P>,
    pub order_repo: Arc<O>,
    pub subscription_repo: Arc<S>,
    pub intent_repo: Arc<dyn PaymentIntentRepository + Send + Sync>,
    pub gateway: Arc<G>,
    pub settings: CheckoutSettings,
}

pub fn routes<P, O, S, G>(deps: CheckoutDeps<P, O, S, G>) -> Router
where
    P: PlanRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    let checkout_usecase = CheckoutUseCase::new(
        deps.plan_repo,
        deps.order_repo,
        deps.subscription_repo,
        deps.intent_repo,
        deps.gateway,
        deps.settings,
    );

    Router::new()
        .route("/", post(start_checkout::<P, O, S, G>))
        .route("/:intent_id/complete", post(complete_checkout::<P, O, S, G>))
        .route("/:intent_id/dismiss", post(dismiss_checkout::<P, O, S, G>))
        .with_state(Arc::new(checkout_usecase))
}

pub async fn start_checkout<P, O, S, G>(
    State(checkout_usecase): State<Arc<CheckoutUseCase<P, O, S, G>>>,
    RequiredSession(session): RequiredSession,
    Json(request): Json<StartCheckoutRequest>,
) -> impl IntoResponse
where
    P: PlanRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    match checkout_usecase
        .start_checkout(&session, request.plan_id, utc_today())
        .await
    {
        Ok(start @ CheckoutStart::Gateway(_)) => (StatusCode::CREATED, Json(start)).into_response(),
        Ok(start @ CheckoutStart::Assigned(_)) => (StatusCode::OK, Json(start)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn complete_checkout<P, O, S, G>(
    State(checkout_usecase): State<Arc<CheckoutUseCase<P, O, S, G>>>,
    RequiredSession(session): RequiredSession,
    Path(intent_id): Path<Uuid>,
    Json(signed): Json<SignedPaymentResponse>,
) -> impl IntoResponse
where
    P: PlanRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    match checkout_usecase
        .complete_checkout(&session, intent_id, signed)
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(CheckoutOutcome::Assigned(outcome))).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn dismiss_checkout<P, O, S, G>(
    State(checkout_usecase): State<Arc<CheckoutUseCase<P, O, S, G>>>,
    RequiredSession(session): RequiredSession,
    Path(intent_id): Path<Uuid>,
) -> impl IntoResponse
where
    P: PlanRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    match checkout_usecase.dismiss_checkout(&session, intent_id).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}
