use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::plans::PlanEntity;

#[async_trait]
#[automock]
pub trait PlanRepository {
    async fn list_plans(&self) -> Result<Vec<PlanEntity>>;
    /// `Ok(None)` when the plan service does not know the id.
    async fn find_by_id(&self, plan_id: Uuid) -> Result<Option<PlanEntity>>;
}
