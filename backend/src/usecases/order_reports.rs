use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use axum::http::StatusCode;
use crates::domain::{
    entities::{orders::OrderEntity, plans::PlanEntity},
    repositories::{orders::OrderRepository, plans::PlanRepository, users::UserRepository},
    value_objects::{
        order_reports::{OrderFilter, OrderReportRow, ReportPage, paginate},
        sessions::{AccessToken, Session},
    },
};
use futures_util::future::join_all;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const REPORT_COLUMNS: [&str; 16] = [
    "Order ID",
    "User Name",
    "User ID",
    "Plan ID",
    "Plan Name",
    "Description",
    "Duration",
    "Features",
    "Total Price",
    "Discounted Price",
    "Discount (%)",
    "Is Discount Active",
    "Is Plan Active",
    "Start Date",
    "End Date",
    "Is Order Active",
];

const MISSING: &str = "—";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("sign in to continue")]
    MissingCredential,
    #[error("administrator role required")]
    Forbidden,
    #[error("order service unavailable")]
    Upstream(#[source] anyhow::Error),
    #[error("failed to render report")]
    Export(#[source] anyhow::Error),
}

impl ReportError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ReportError::MissingCredential => StatusCode::UNAUTHORIZED,
            ReportError::Forbidden => StatusCode::FORBIDDEN,
            ReportError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ReportError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            ReportError::MissingCredential | ReportError::Forbidden => "precondition",
            ReportError::Upstream(_) => "upstream",
            ReportError::Export(_) => "internal",
        }
    }
}

pub struct OrderReportUseCase<O, U, P>
where
    O: OrderRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
{
    order_repo: Arc<O>,
    user_repo: Arc<U>,
    plan_repo: Arc<P>,
}

impl<O, U, P> OrderReportUseCase<O, U, P>
where
    O: OrderRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
{
    pub fn new(order_repo: Arc<O>, user_repo: Arc<U>, plan_repo: Arc<P>) -> Self {
        Self {
            order_repo,
            user_repo,
            plan_repo,
        }
    }

    /// Every order joined with its user's display name and the plan's current
    /// details. Lookups run concurrently; a failed lookup degrades its rows
    /// instead of failing the report.
    pub async fn load_report(&self, session: &Session) -> Result<Vec<OrderReportRow>, ReportError> {
        let token = session.token().ok_or(ReportError::MissingCredential)?;
        if !session.is_admin() {
            return Err(ReportError::Forbidden);
        }

        let orders = self
            .order_repo
            .list_all_orders(token.clone())
            .await
            .map_err(|err| {
                error!(error = ?err, "order_reports: failed to list orders");
                ReportError::Upstream(err)
            })?;

        let user_ids: BTreeSet<Uuid> = orders.iter().map(|order| order.user_id).collect();
        let plan_ids: BTreeSet<Uuid> = orders.iter().map(|order| order.plan_id).collect();

        let (names, plans) = tokio::join!(
            self.user_names(token, &user_ids),
            self.plan_details(&plan_ids)
        );

        let rows: Vec<OrderReportRow> = orders
            .into_iter()
            .map(|order| {
                let user_name = names
                    .get(&order.user_id)
                    .cloned()
                    .or_else(|| order.user_name.clone())
                    .unwrap_or_else(|| order.user_id.to_string());
                let plan = plans.get(&order.plan_id);
                report_row(order, user_name, plan)
            })
            .collect();

        info!(
            row_count = rows.len(),
            user_count = user_ids.len(),
            plan_count = plan_ids.len(),
            "order_reports: report loaded"
        );
        Ok(rows)
    }

    /// Filters then paginates an already loaded report.
    pub fn page(
        &self,
        rows: Vec<OrderReportRow>,
        filter: &OrderFilter,
        page: usize,
        per_page: usize,
    ) -> ReportPage<OrderReportRow> {
        let filtered = filter_rows(rows, filter);
        paginate(&filtered, page, per_page)
    }

    async fn user_names(&self, token: &AccessToken, user_ids: &BTreeSet<Uuid>) -> HashMap<Uuid, String> {
        let lookups = user_ids.iter().map(|&user_id| {
            let token = token.clone();
            async move {
                match self.user_repo.find_display_name(token, user_id).await {
                    Ok(name) if !name.trim().is_empty() => Some((user_id, name)),
                    Ok(_) => None,
                    Err(err) => {
                        warn!(%user_id, error = ?err, "order_reports: user lookup failed");
                        None
                    }
                }
            }
        });

        join_all(lookups).await.into_iter().flatten().collect()
    }

    async fn plan_details(&self, plan_ids: &BTreeSet<Uuid>) -> HashMap<Uuid, PlanEntity> {
        let lookups = plan_ids.iter().map(|&plan_id| async move {
            match self.plan_repo.find_by_id(plan_id).await {
                Ok(plan) => plan.map(|plan| (plan_id, plan)),
                Err(err) => {
                    warn!(%plan_id, error = ?err, "order_reports: plan lookup failed");
                    None
                }
            }
        });

        join_all(lookups).await.into_iter().flatten().collect()
    }
}

/// Plan details fetched now take precedence over the snapshot stored on the order.
fn report_row(order: OrderEntity, user_name: String, plan: Option<&PlanEntity>) -> OrderReportRow {
    let features = match plan {
        Some(plan) => plan.features.iter().map(|feature| feature.name.clone()).collect(),
        None => order.features.iter().map(|feature| feature.name.clone()).collect(),
    };

    OrderReportRow {
        order_id: order.id,
        user_id: order.user_id,
        user_name,
        plan_id: order.plan_id,
        plan_name: plan.map(|plan| plan.name.clone()).or(order.plan_name),
        description: plan
            .and_then(|plan| plan.description.clone())
            .or(order.description),
        duration_label: plan
            .map(|plan| plan.duration.label())
            .unwrap_or_else(|| order.duration.label()),
        features,
        total_price: plan.map(|plan| plan.total_price).or(order.total_price),
        discounted_price: plan
            .and_then(|plan| plan.discounted_price)
            .or(order.discounted_price),
        discount_percentage: plan.and_then(|plan| plan.discount_percentage),
        is_discount_active: plan
            .map(|plan| plan.is_discount_active)
            .or(order.is_discount_active)
            .unwrap_or(false),
        is_plan_active: plan
            .map(|plan| plan.is_active)
            .or(order.is_plan_active)
            .unwrap_or(false),
        start_date: order.start_date,
        end_date: order.end_date,
        is_order_active: order.is_active,
    }
}

pub fn filter_rows(rows: Vec<OrderReportRow>, filter: &OrderFilter) -> Vec<OrderReportRow> {
    rows.into_iter().filter(|row| filter.matches(row)).collect()
}

fn or_missing(value: Option<String>) -> String {
    value
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| MISSING.to_string())
}

fn price(value: Option<Decimal>) -> String {
    or_missing(value.map(|value| format!("₹{value}")))
}

fn yes_no(flag: bool) -> String {
    let answer = if flag { "Yes" } else { "No" };
    answer.to_string()
}

/// Renders exactly the report columns, one record per row.
pub fn export_csv(rows: &[OrderReportRow]) -> Result<Vec<u8>, ReportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(REPORT_COLUMNS)
        .map_err(|err| ReportError::Export(err.into()))?;

    for row in rows {
        let features = (!row.features.is_empty()).then(|| row.features.join(", "));
        writer
            .write_record([
                row.order_id.to_string(),
                row.user_name.clone(),
                row.user_id.to_string(),
                row.plan_id.to_string(),
                or_missing(row.plan_name.clone()),
                or_missing(row.description.clone()),
                or_missing(Some(row.duration_label.to_string())),
                or_missing(features),
                price(row.total_price),
                price(row.discounted_price),
                or_missing(row.discount_percentage.map(|pct| format!("{pct}%"))),
                yes_no(row.is_discount_active),
                yes_no(row.is_plan_active),
                or_missing(row.start_date.map(|date| date.format("%Y-%m-%d").to_string())),
                or_missing(row.end_date.map(|date| date.format("%Y-%m-%d").to_string())),
                yes_no(row.is_order_active),
            ])
            .map_err(|err| ReportError::Export(err.into()))?;
    }

    writer
        .into_inner()
        .map_err(|err| ReportError::Export(anyhow::anyhow!("csv flush failed: {}", err.error())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crates::domain::{
        entities::features::FeatureEntity,
        repositories::{
            orders::MockOrderRepository, plans::MockPlanRepository, users::MockUserRepository,
        },
        value_objects::enums::{plan_durations::PlanDuration, user_roles::UserRole},
    };

    fn admin() -> Session {
        Session::authenticated(AccessToken::new("tok"), "admin@example.com", vec![UserRole::Admin])
    }

    fn order(user_id: Uuid, plan_id: Uuid, start: &str) -> OrderEntity {
        OrderEntity {
            id: Uuid::new_v4(),
            user_id,
            plan_id,
            plan_name: Some("Snapshot".to_string()),
            description: None,
            duration: PlanDuration::Month,
            user_name: None,
            created_at: None,
            start_date: NaiveDate::parse_from_str(start, "%Y-%m-%d").ok(),
            end_date: None,
            is_active: true,
            total_price: Some(Decimal::new(500, 0)),
            discounted_price: None,
            is_discount_active: None,
            is_plan_active: None,
            features: vec![],
        }
    }

    fn plan(plan_id: Uuid) -> PlanEntity {
        PlanEntity {
            id: plan_id,
            name: "Gold".to_string(),
            description: Some("Fast charging".to_string()),
            duration: PlanDuration::Year,
            total_price: Decimal::new(5000, 0),
            discounted_price: Some(Decimal::new(4500, 0)),
            discount_percentage: Some(Decimal::new(10, 0)),
            is_discount_active: true,
            features: vec![FeatureEntity {
                id: Uuid::new_v4(),
                code: "DC".to_string(),
                name: "DC charging".to_string(),
                description: None,
                unit: None,
                usage_limit: 10,
                price_per_unit: Decimal::ZERO,
                default_included_units: 0,
                is_active: true,
            }],
            is_active: true,
        }
    }

    #[tokio::test]
    async fn report_joins_names_and_plans_with_fallbacks() {
        let known_user = Uuid::new_v4();
        let unknown_user = Uuid::new_v4();
        let known_plan = Uuid::new_v4();
        let missing_plan = Uuid::new_v4();
        let orders = vec![
            order(known_user, known_plan, "2024-03-01"),
            order(unknown_user, missing_plan, "2024-04-01"),
        ];

        let mut order_repo = MockOrderRepository::new();
        order_repo.expect_list_all_orders().returning(move |_| {
            let orders = orders.clone();
            Box::pin(async move { Ok(orders) })
        });
        let mut user_repo = MockUserRepository::new();
        user_repo.expect_find_display_name().returning(move |_, user_id| {
            Box::pin(async move {
                if user_id == known_user {
                    Ok("Asha".to_string())
                } else {
                    Err(anyhow::anyhow!("user service returned 500"))
                }
            })
        });
        let mut plan_repo = MockPlanRepository::new();
        plan_repo.expect_find_by_id().returning(move |plan_id| {
            let found = (plan_id == known_plan).then(|| plan(plan_id));
            Box::pin(async move { Ok(found) })
        });

        let usecase = OrderReportUseCase::new(Arc::new(order_repo), Arc::new(user_repo), Arc::new(plan_repo));
        let rows = usecase.load_report(&admin()).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].user_name, "Asha");
        assert_eq!(rows[0].plan_name.as_deref(), Some("Gold"));
        assert_eq!(rows[0].duration_label, "Yearly");
        assert_eq!(rows[0].features, vec!["DC charging".to_string()]);
        assert_eq!(rows[1].user_name, unknown_user.to_string());
        assert_eq!(rows[1].plan_name.as_deref(), Some("Snapshot"));
        assert_eq!(rows[1].total_price, Some(Decimal::new(500, 0)));

        let filter = OrderFilter {
            plan_name: Some("gol".to_string()),
            ..OrderFilter::default()
        };
        let page = usecase.page(rows, &filter, 1, 10);
        assert_eq!(page.total_rows, 1);
        assert_eq!(page.total_pages, 1);
    }

    #[tokio::test]
    async fn non_admin_is_forbidden() {
        let usecase = OrderReportUseCase::new(
            Arc::new(MockOrderRepository::new()),
            Arc::new(MockUserRepository::new()),
            Arc::new(MockPlanRepository::new()),
        );
        let session =
            Session::authenticated(AccessToken::new("tok"), "rider@example.com", vec![UserRole::User]);

        let err = usecase.load_report(&session).await.unwrap_err();
        assert!(matches!(err, ReportError::Forbidden));
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        let err = usecase.load_report(&Session::Anonymous).await.unwrap_err();
        assert!(matches!(err, ReportError::MissingCredential));
    }

    #[test]
    fn csv_has_exactly_the_report_columns() {
        let plan_id = Uuid::new_v4();
        let row = report_row(order(Uuid::new_v4(), plan_id, "2024-03-01"), "Asha".to_string(), Some(&plan(plan_id)));

        let bytes = export_csv(&[row]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();

        assert_eq!(lines.next(), Some(REPORT_COLUMNS.join(",").as_str()));
        let record = lines.next().unwrap();
        assert!(record.contains(",Gold,Fast charging,Yearly,DC charging,₹5000,₹4500,10%,Yes,Yes,2024-03-01,—,Yes"));
        assert_eq!(lines.next(), None);
    }
}
