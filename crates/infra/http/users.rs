use anyhow::Result;
use async_trait::async_trait;
use reqwest::Method;
use uuid::Uuid;

use super::service_client::ServiceClient;
use crate::domain::{
    repositories::users::UserRepository,
    value_objects::sessions::{AccessToken, LoginCredentials, LoginResponse, UserProfile},
};

pub struct UserServiceClient {
    client: ServiceClient,
}

impl UserServiceClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client: ServiceClient::new(http, base_url, "user-service"),
        }
    }
}

#[async_trait]
impl UserRepository for UserServiceClient {
    async fn login(&self, credentials: LoginCredentials) -> Result<LoginResponse> {
        let body = serde_json::json!({
            "email": credentials.email,
            "password": credentials.password,
        });

        let resp = self
            .client
            .request(Method::POST, "/api/users/login", None)
            .json(&body)
            .send()
            .await?;
        let resp = self.client.ensure_success(resp, "login").await?;

        Ok(resp.json().await?)
    }

    async fn profile(&self, token: AccessToken) -> Result<UserProfile> {
        let resp = self
            .client
            .request(Method::GET, "/api/users/profile", Some(&token))
            .send()
            .await?;
        let resp = self.client.ensure_success(resp, "get profile").await?;

        Ok(resp.json().await?)
    }

    /// The users service answers this one with a bare name, not JSON.
    async fn find_display_name(&self, token: AccessToken, user_id: Uuid) -> Result<String> {
        let resp = self
            .client
            .request(Method::GET, &format!("/api/users/by-id/{user_id}"), Some(&token))
            .send()
            .await?;
        let resp = self.client.ensure_success(resp, "get user name").await?;

        let name = resp.text().await?;
        Ok(name.trim().trim_matches('"').to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::http::service_client::build_http_client;
    use std::time::Duration;

    #[tokio::test]
    async fn display_name_is_plain_text() {
        let mut server = mockito::Server::new_async().await;
        let user_id = Uuid::new_v4();
        server
            .mock("GET", format!("/api/users/by-id/{user_id}").as_str())
            .with_status(200)
            .with_body("Asha Rao\n")
            .create_async()
            .await;

        let client = UserServiceClient::new(
            build_http_client(Duration::from_secs(2)).unwrap(),
            server.url(),
        );
        let name = client
            .find_display_name(AccessToken::new("tok"), user_id)
            .await
            .unwrap();

        assert_eq!(name, "Asha Rao");
    }
}
