use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::orders::OrderEntity,
    value_objects::{checkout::OrderAssignment, sessions::AccessToken},
};

#[async_trait]
#[automock]
pub trait OrderRepository {
    async fn list_user_orders(&self, token: AccessToken, user_id: Uuid) -> Result<Vec<OrderEntity>>;
    async fn list_all_orders(&self, token: AccessToken) -> Result<Vec<OrderEntity>>;
    /// Returns the assigned order record as the order service reported it.
    async fn assign_order(
        &self,
        token: AccessToken,
        assignment: OrderAssignment,
    ) -> Result<serde_json::Value>;
    async fn assign_free_order(
        &self,
        token: AccessToken,
        user_id: Uuid,
        plan_id: Uuid,
    ) -> Result<serde_json::Value>;
}
