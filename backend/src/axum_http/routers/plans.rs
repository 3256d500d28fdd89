use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use crates::domain::{
    repositories::plans::PlanRepository, value_objects::plans::PlanCatalogFilter,
};
use uuid::Uuid;

use crate::{axum_http::error_responses::AppError, usecases::plan_catalog::PlanCatalogUseCase};

pub fn routes<P>(plan_repo: Arc<P>) -> Router
where
    P: PlanRepository + Send + Sync + 'static,
{
    let plan_catalog_usecase = PlanCatalogUseCase::new(plan_repo);

    Router::new()
        .route("/", get(list_plans::<P>))
        .route("/:plan_id", get(get_plan::<P>))
        .with_state(Arc::new(plan_catalog_usecase))
}

pub async fn list_plans<P>(
    State(plan_catalog_usecase): State<Arc<PlanCatalogUseCase<P>>>,
    Query(filter): Query<PlanCatalogFilter>,
) -> impl IntoResponse
where
    P: PlanRepository + Send + Sync + 'static,
{
    match plan_catalog_usecase.list_plans(&filter).await {
        Ok(plans) => (StatusCode::OK, Json(plans)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn get_plan<P>(
    State(plan_catalog_usecase): State<Arc<PlanCatalogUseCase<P>>>,
    Path(plan_id): Path<Uuid>,
) -> impl IntoResponse
where
    P: PlanRepository + Send + Sync + 'static,
{
    match plan_catalog_usecase.get_plan(plan_id).await {
        Ok(plan) => (StatusCode::OK, Json(plan)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}
