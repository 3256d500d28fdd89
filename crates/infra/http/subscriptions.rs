use anyhow::Result;
use async_trait::async_trait;
use reqwest::Method;
use uuid::Uuid;

use super::{orders::read_record, service_client::ServiceClient};
use crate::domain::{
    entities::subscriptions::SubscriptionEntity,
    repositories::subscriptions::SubscriptionRepository, value_objects::sessions::AccessToken,
};

pub struct SubscriptionServiceClient {
    client: ServiceClient,
}

impl SubscriptionServiceClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client: ServiceClient::new(http, base_url, "subscription-service"),
        }
    }
}

#[async_trait]
impl SubscriptionRepository for SubscriptionServiceClient {
    async fn list_user_subscriptions(
        &self,
        token: AccessToken,
        user_id: Uuid,
    ) -> Result<Vec<SubscriptionEntity>> {
        let resp = self
            .client
            .request(Method::GET, &format!("/api/subscriptions/{user_id}"), Some(&token))
            .send()
            .await?;
        let resp = self
            .client
            .ensure_success(resp, "list user subscriptions")
            .await?;

        Ok(resp.json().await?)
    }

    async fn assign_subscription(
        &self,
        token: AccessToken,
        user_id: Uuid,
        plan_id: Uuid,
    ) -> Result<serde_json::Value> {
        let resp = self
            .client
            .request(
                Method::POST,
                &format!("/api/subscriptions/{user_id}/assign/{plan_id}"),
                Some(&token),
            )
            .send()
            .await?;
        let resp = self.client.ensure_success(resp, "assign subscription").await?;

        read_record(resp).await
    }

    async fn assign_free_subscription(
        &self,
        token: AccessToken,
        user_id: Uuid,
        plan_id: Uuid,
    ) -> Result<serde_json::Value> {
        let resp = self
            .client
            .request(
                Method::POST,
                &format!("/api/subscriptions/{user_id}/assign-free/{plan_id}"),
                Some(&token),
            )
            .send()
            .await?;
        let resp = self
            .client
            .ensure_success(resp, "assign free subscription")
            .await?;

        read_record(resp).await
    }
}
