use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use uuid::Uuid;

use super::service_client::ServiceClient;
use crate::domain::{entities::plans::PlanEntity, repositories::plans::PlanRepository};

/// Public read path of the plan service; no credential is sent.
pub struct PlanServiceClient {
    client: ServiceClient,
}

impl PlanServiceClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client: ServiceClient::new(http, base_url, "plan-service"),
        }
    }
}

#[async_trait]
impl PlanRepository for PlanServiceClient {
    async fn list_plans(&self) -> Result<Vec<PlanEntity>> {
        let resp = self
            .client
            .request(Method::GET, "/api/v1/plans", None)
            .send()
            .await?;
        let resp = self.client.ensure_success(resp, "list plans").await?;

        Ok(resp.json().await?)
    }

    async fn find_by_id(&self, plan_id: Uuid) -> Result<Option<PlanEntity>> {
        let resp = self
            .client
            .request(Method::GET, &format!("/api/v1/plans/{plan_id}"), None)
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = self.client.ensure_success(resp, "get plan").await?;

        Ok(Some(resp.json().await?))
    }
}
