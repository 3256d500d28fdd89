use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{
    Method, RequestBuilder, Response, StatusCode,
    header::{ACCEPT, AUTHORIZATION},
};
use serde::Deserialize;
use thiserror::Error;
use tracing::error;

use crate::domain::value_objects::sessions::AccessToken;

/// Non-2xx answer from one of the upstream services.
#[derive(Debug, Error)]
#[error("{service} {context} failed with status {status}{}", detail_suffix(.message))]
pub struct UpstreamError {
    pub service: &'static str,
    pub context: String,
    pub status: StatusCode,
    pub message: Option<String>,
}

fn detail_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|message| format!(": {message}"))
        .unwrap_or_default()
}

/// Spring services answer with either `{"message": ..}` or `{"error": ..}`.
#[derive(Debug, Deserialize)]
struct UpstreamErrorEnvelope {
    message: Option<String>,
    error: Option<String>,
}

/// Base URLs of the services this backend consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamEndpoints {
    pub plans: String,
    pub orders: String,
    pub subscriptions: String,
    pub payments: String,
    pub users: String,
}

impl UpstreamEndpoints {
    /// Every service behind one API gateway.
    pub fn behind_gateway(gateway_url: &str) -> Self {
        let base = gateway_url.trim_end_matches('/').to_string();
        Self {
            plans: base.clone(),
            orders: base.clone(),
            subscriptions: base.clone(),
            payments: base.clone(),
            users: base,
        }
    }
}

pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(5)))
        .build()
        .context("failed to build upstream http client")
}

/// Thin wrapper over a shared reqwest client, scoped to one upstream service.
#[derive(Clone)]
pub struct ServiceClient {
    http: reqwest::Client,
    base_url: String,
    service: &'static str,
}

impl ServiceClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, service: &'static str) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service,
        }
    }

    pub fn request(&self, method: Method, path: &str, token: Option<&AccessToken>) -> RequestBuilder {
        let builder = self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .header(ACCEPT, "application/json");

        match token {
            Some(token) => builder.header(AUTHORIZATION, token.bearer()),
            None => builder,
        }
    }

    pub async fn ensure_success(&self, resp: Response, context: &str) -> Result<Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let message = match serde_json::from_str::<UpstreamErrorEnvelope>(&body) {
            Ok(envelope) => envelope.message.or(envelope.error),
            Err(_) if body.starts_with('<') => None,
            Err(_) => Some(body.chars().take(200).collect()),
        };

        error!(
            service = self.service,
            status = %status,
            upstream_message = ?message,
            response_body = %body,
            context = %context,
            "upstream request failed"
        );

        Err(UpstreamError {
            service: self.service,
            context: context.to_string(),
            status,
            message,
        }
        .into())
    }
}

/// Status of the upstream failure behind `err`, if it was one.
pub fn upstream_status(err: &anyhow::Error) -> Option<StatusCode> {
    err.downcast_ref::<UpstreamError>().map(|upstream| upstream.status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn surfaces_upstream_message_and_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/plans")
            .with_status(503)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message":"plan service is warming up"}"#)
            .create_async()
            .await;

        let http = build_http_client(Duration::from_secs(2)).unwrap();
        let client = ServiceClient::new(http, server.url(), "plan-service");
        let resp = client
            .request(Method::GET, "/api/v1/plans", None)
            .send()
            .await
            .unwrap();

        let err = client.ensure_success(resp, "list plans").await.unwrap_err();

        mock.assert_async().await;
        assert_eq!(upstream_status(&err), Some(StatusCode::SERVICE_UNAVAILABLE));
        assert!(err.to_string().contains("plan service is warming up"));
    }

    #[tokio::test]
    async fn forwards_bearer_credential() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/users/profile")
            .match_header("authorization", "Bearer abc.def")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let http = build_http_client(Duration::from_secs(2)).unwrap();
        let client = ServiceClient::new(http, format!("{}/", server.url()), "user-service");
        let token = AccessToken::new("abc.def");
        let resp = client
            .request(Method::GET, "/api/users/profile", Some(&token))
            .send()
            .await
            .unwrap();

        assert!(client.ensure_success(resp, "profile").await.is_ok());
        mock.assert_async().await;
    }
}
