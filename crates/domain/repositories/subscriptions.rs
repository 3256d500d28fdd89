use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::{entities::subscriptions::SubscriptionEntity, value_objects::sessions::AccessToken};

#[async_trait]
#[automock]
pub trait SubscriptionRepository {
    async fn list_user_subscriptions(
        &self,
        token: AccessToken,
        user_id: Uuid,
    ) -> Result<Vec<SubscriptionEntity>>;
    async fn assign_subscription(
        &self,
        token: AccessToken,
        user_id: Uuid,
        plan_id: Uuid,
    ) -> Result<serde_json::Value>;
    async fn assign_free_subscription(
        &self,
        token: AccessToken,
        user_id: Uuid,
        plan_id: Uuid,
    ) -> Result<serde_json::Value>;
}
