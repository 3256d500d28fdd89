use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
};
use crates::domain::value_objects::sessions::Session;

use crate::{
    axum_http::error_responses::AppError,
    usecases::auth::{AuthError, SessionAuthenticator},
};

/// Installed as a request extension by the HTTP server.
pub type SharedAuthenticator = Arc<dyn SessionAuthenticator + Send + Sync>;

/// Caller session for public routes; no header means anonymous.
#[derive(Debug, Clone)]
pub struct OptionalSession(pub Session);

/// Caller session for routes that need a signed-in user.
#[derive(Debug, Clone)]
pub struct RequiredSession(pub Session);

/// Caller session carrying the `ADMIN` role.
#[derive(Debug, Clone)]
pub struct AdminSession(pub Session);

fn bearer_token(parts: &Parts) -> Result<Option<String>, AppError> {
    let Some(auth_header) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let auth_str = auth_header.to_str().map_err(|_| {
        AppError::new(
            StatusCode::UNAUTHORIZED,
            "precondition",
            "Invalid Authorization header",
        )
    })?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(Some(token.trim().to_string())),
        _ => Err(AppError::new(
            StatusCode::UNAUTHORIZED,
            "precondition",
            "Invalid Authorization header format",
        )),
    }
}

async fn resolve_session(parts: &Parts) -> Result<Session, AppError> {
    let Some(token) = bearer_token(parts)? else {
        return Ok(Session::Anonymous);
    };

    let authenticator = parts
        .extensions
        .get::<SharedAuthenticator>()
        .cloned()
        .ok_or_else(|| AppError::from(anyhow::anyhow!("session authenticator not installed")))?;

    Ok(authenticator.authenticate(token).await?)
}

#[async_trait]
impl<S> FromRequestParts<S> for OptionalSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalSession(resolve_session(parts).await?))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequiredSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match resolve_session(parts).await? {
            Session::Anonymous => Err(AuthError::MissingCredential.into()),
            session => Ok(RequiredSession(session)),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequiredSession(session) = RequiredSession::from_request_parts(parts, state).await?;
        if !session.is_admin() {
            return Err(AuthError::Forbidden.into());
        }
        Ok(AdminSession(session))
    }
}
