use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::usecases::{
    auth::AuthError, checkout::CheckoutError, order_reports::ReportError,
    plan_catalog::CatalogError, upgrades::QuoteError,
};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub category: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<serde_json::Value>,
}

/// HTTP face of every usecase error. Internal details stay in the logs.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    category: &'static str,
    message: String,
    order: Option<serde_json::Value>,
}

impl AppError {
    pub fn new(status: StatusCode, category: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            category,
            message: message.into(),
            order: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "precondition", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn category(&self) -> &'static str {
        self.category
    }

    fn from_parts(status: StatusCode, category: &'static str, message: String) -> Self {
        if status.is_server_error() && category == "internal" {
            return Self::new(status, category, "Internal server error");
        }
        Self::new(status, category, message)
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        Self::from_parts(err.status_code(), err.category(), err.to_string())
    }
}

impl From<QuoteError> for AppError {
    fn from(err: QuoteError) -> Self {
        Self::from_parts(err.status_code(), err.category(), err.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        Self::from_parts(err.status_code(), err.category(), err.to_string())
    }
}

impl From<ReportError> for AppError {
    fn from(err: ReportError) -> Self {
        Self::from_parts(err.status_code(), err.category(), err.to_string())
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        let mut app_error = Self::from_parts(err.status_code(), err.category(), err.to_string());
        if let CheckoutError::PartialAssignment { order, .. } = err {
            app_error.order = Some(order);
        }
        app_error
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        error!(error = ?err, "http: unhandled error");
        Self::from_parts(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            err.to_string(),
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            code: self.status.as_u16(),
            category: self.category,
            message: self.message,
            order: self.order,
        });

        (self.status, body).into_response()
    }
}
