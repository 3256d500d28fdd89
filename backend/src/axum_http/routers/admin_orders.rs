use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use chrono::NaiveDate;
use crates::domain::{
    repositories::{orders::OrderRepository, plans::PlanRepository, users::UserRepository},
    value_objects::order_reports::OrderFilter,
};
use serde::Deserialize;

use crate::{
    auth::AdminSession,
    axum_http::error_responses::AppError,
    usecases::order_reports::{OrderReportUseCase, export_csv, filter_rows},
};

const DEFAULT_PER_PAGE: usize = 10;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderReportQuery {
    pub plan_name: Option<String>,
    pub user_name: Option<String>,
    pub start_on_or_after: Option<NaiveDate>,
    pub start_on_or_before: Option<NaiveDate>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

impl OrderReportQuery {
    fn filter(&self) -> OrderFilter {
        OrderFilter {
            plan_name: self.plan_name.clone(),
            user_name: self.user_name.clone(),
            start_on_or_after: self.start_on_or_after,
            start_on_or_before: self.start_on_or_before,
        }
    }
}

pub fn routes<O, U, P>(order_repo: Arc<O>, user_repo: Arc<U>, plan_repo: Arc<P>) -> Router
where
    O: OrderRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
{
    let order_report_usecase = OrderReportUseCase::new(order_repo, user_repo, plan_repo);

    Router::new()
        .route("/", get(list_orders::<O, U, P>))
        .route("/export", get(export_orders::<O, U, P>))
        .with_state(Arc::new(order_report_usecase))
}

pub async fn list_orders<O, U, P>(
    State(order_report_usecase): State<Arc<OrderReportUseCase<O, U, P>>>,
    AdminSession(session): AdminSession,
    Query(query): Query<OrderReportQuery>,
) -> impl IntoResponse
where
    O: OrderRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
{
    let rows = match order_report_usecase.load_report(&session).await {
        Ok(rows) => rows,
        Err(err) => return AppError::from(err).into_response(),
    };

    let page = order_report_usecase.page(
        rows,
        &query.filter(),
        query.page.unwrap_or(1),
        query.per_page.unwrap_or(DEFAULT_PER_PAGE),
    );
    (StatusCode::OK, Json(page)).into_response()
}

pub async fn export_orders<O, U, P>(
    State(order_report_usecase): State<Arc<OrderReportUseCase<O, U, P>>>,
    AdminSession(session): AdminSession,
    Query(query): Query<OrderReportQuery>,
) -> impl IntoResponse
where
    O: OrderRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
{
    let rows = match order_report_usecase.load_report(&session).await {
        Ok(rows) => filter_rows(rows, &query.filter()),
        Err(err) => return AppError::from(err).into_response(),
    };

    match export_csv(&rows) {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (header::CONTENT_DISPOSITION, "attachment; filename=\"orders.csv\""),
            ],
            bytes,
        )
            .into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}
