use std::sync::Arc;

use axum::http::StatusCode;
use crates::domain::{
    repositories::plans::PlanRepository,
    value_objects::plans::{PlanCatalogFilter, PlanView},
};
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("plan {0} not found")]
    PlanNotFound(Uuid),
    #[error("plan service unavailable")]
    Upstream(#[source] anyhow::Error),
}

impl CatalogError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CatalogError::PlanNotFound(_) => StatusCode::NOT_FOUND,
            CatalogError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            CatalogError::PlanNotFound(_) => "not_found",
            CatalogError::Upstream(_) => "upstream",
        }
    }
}

/// Read-only view over the plan service. No caching; every call goes upstream.
pub struct PlanCatalogUseCase<P>
where
    P: PlanRepository + Send + Sync + 'static,
{
    plan_repo: Arc<P>,
}

impl<P> PlanCatalogUseCase<P>
where
    P: PlanRepository + Send + Sync + 'static,
{
    pub fn new(plan_repo: Arc<P>) -> Self {
        Self { plan_repo }
    }

    pub async fn list_plans(&self, filter: &PlanCatalogFilter) -> Result<Vec<PlanView>, CatalogError> {
        let plans = self.plan_repo.list_plans().await.map_err(|err| {
            error!(error = ?err, "plan_catalog: failed to list plans");
            CatalogError::Upstream(err)
        })?;

        let views: Vec<PlanView> = plans
            .into_iter()
            .filter(|plan| filter.matches(plan))
            .map(PlanView::from)
            .collect();

        info!(plan_count = views.len(), "plan_catalog: plans listed");
        Ok(views)
    }

    pub async fn get_plan(&self, plan_id: Uuid) -> Result<PlanView, CatalogError> {
        let plan = self
            .plan_repo
            .find_by_id(plan_id)
            .await
            .map_err(|err| {
                error!(%plan_id, error = ?err, "plan_catalog: failed to load plan");
                CatalogError::Upstream(err)
            })?
            .ok_or(CatalogError::PlanNotFound(plan_id))?;

        Ok(PlanView::from(plan))
    }
}
