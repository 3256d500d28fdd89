use anyhow::Result;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use crate::{
    domain::value_objects::{
        checkout::{
            GatewayOrder, GatewayOrderRequest, PaymentVerification, SignedPaymentResponse,
            lenient_id,
        },
        sessions::AccessToken,
    },
    infra::http::service_client::ServiceClient,
};

/// The payment backend answered, but not with something we can charge against.
#[derive(Debug, Error, PartialEq)]
pub enum GatewayOrderError {
    #[error("payment backend did not return a gateway order id")]
    MissingOrderId,
    #[error("payment backend did not confirm the charged amount")]
    MissingAmount,
    #[error("payment backend returned a non-numeric amount: {0}")]
    NonNumericAmount(String),
    #[error("payment order {0} is unknown to the payment backend")]
    UnknownOrder(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrderResp {
    razorpay_order_id: Option<String>,
    amount: Option<serde_json::Value>,
    currency: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    internal_payment_id: Option<String>,
}

/// Client for the payment backend that fronts the Razorpay-style gateway.
pub struct PaymentServiceClient {
    client: ServiceClient,
    default_currency: String,
}

impl PaymentServiceClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        default_currency: impl Into<String>,
    ) -> Self {
        Self {
            client: ServiceClient::new(http, base_url, "payment-service"),
            default_currency: default_currency.into(),
        }
    }

    /// Opens a gateway order. The backend is the authority on the amount; the
    /// returned order carries its figure, not ours.
    pub async fn create_order(
        &self,
        token: &AccessToken,
        request: &GatewayOrderRequest,
    ) -> Result<GatewayOrder> {
        let resp = self
            .client
            .request(Method::POST, "/api/payments/create", Some(token))
            .json(request)
            .send()
            .await?;
        let resp = self
            .client
            .ensure_success(resp, "create payment order")
            .await?;

        let parsed: CreateOrderResp = resp.json().await?;

        let gateway_order_id = parsed
            .razorpay_order_id
            .filter(|id| !id.trim().is_empty())
            .ok_or(GatewayOrderError::MissingOrderId)?;
        let amount_minor = parse_minor_amount(parsed.amount.as_ref())?;

        info!(
            plan_id = %request.plan_id,
            gateway_order_id = %gateway_order_id,
            amount_minor,
            "payments: gateway order created"
        );

        Ok(GatewayOrder {
            gateway_order_id,
            amount_minor,
            currency: parsed
                .currency
                .filter(|currency| !currency.trim().is_empty())
                .unwrap_or_else(|| self.default_currency.clone()),
            internal_payment_id: parsed.internal_payment_id,
        })
    }

    pub async fn verify_payment(
        &self,
        token: &AccessToken,
        signed: &SignedPaymentResponse,
    ) -> Result<PaymentVerification> {
        let resp = self
            .client
            .request(Method::POST, "/api/payments/verify", Some(token))
            .json(signed)
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            error!(
                gateway_order_id = %signed.razorpay_order_id,
                "payments: verify called for unknown order"
            );
            return Err(GatewayOrderError::UnknownOrder(signed.razorpay_order_id.clone()).into());
        }
        let resp = self.client.ensure_success(resp, "verify payment").await?;

        Ok(resp.json().await?)
    }
}

/// Accepts integral numbers or numeric strings; anything else is a backend misconfiguration.
fn parse_minor_amount(raw: Option<&serde_json::Value>) -> Result<i64, GatewayOrderError> {
    let value = match raw {
        None | Some(serde_json::Value::Null) => return Err(GatewayOrderError::MissingAmount),
        Some(value) => value,
    };

    let parsed = match value {
        serde_json::Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        serde_json::Value::String(text) => {
            let trimmed = text.trim();
            trimmed.parse::<i64>().ok().or_else(|| {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && f.fract() == 0.0)
                    .map(|f| f as i64)
            })
        }
        _ => None,
    };

    parsed
        .filter(|amount| *amount >= 0)
        .ok_or_else(|| GatewayOrderError::NonNumericAmount(value.to_string()))
}
