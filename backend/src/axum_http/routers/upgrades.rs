use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use crates::domain::{
    repositories::{orders::OrderRepository, plans::PlanRepository},
    value_objects::{calendar::utc_today, plans::PlanCatalogFilter},
};

use crate::{
    auth::OptionalSession, axum_http::error_responses::AppError,
    usecases::upgrades::UpgradeQuoteUseCase,
};

pub fn routes<P, O>(plan_repo: Arc<P>, order_repo: Arc<O>) -> Router
where
    P: PlanRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
{
    let upgrade_usecase = UpgradeQuoteUseCase::new(plan_repo, order_repo);

    Router::new()
        .route("/", get(upgrade_options::<P, O>))
        .with_state(Arc::new(upgrade_usecase))
}

pub async fn upgrade_options<P, O>(
    State(upgrade_usecase): State<Arc<UpgradeQuoteUseCase<P, O>>>,
    OptionalSession(session): OptionalSession,
    Query(filter): Query<PlanCatalogFilter>,
) -> impl IntoResponse
where
    P: PlanRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
{
    match upgrade_usecase
        .upgrade_options(&session, utc_today(), &filter)
        .await
    {
        Ok(options) => (StatusCode::OK, Json(options)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}
