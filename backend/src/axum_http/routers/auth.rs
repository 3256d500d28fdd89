use std::sync::Arc;

use axum::{
    Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post,
};
use crates::domain::{
    repositories::users::UserRepository,
    value_objects::{
        enums::user_roles::UserRole,
        sessions::{LoginCredentials, Session, UserProfile},
    },
};
use serde::{Deserialize, Serialize};

use crate::{
    auth::RequiredSession, axum_http::error_responses::AppError, usecases::auth::AuthUseCase,
};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginBody {
    pub token: String,
    pub email: String,
    pub roles: Vec<UserRole>,
    pub profile: Option<UserProfile>,
}

impl LoginBody {
    fn from_session(session: Session) -> Option<Self> {
        match session {
            Session::Authenticated(session) => Some(Self {
                token: session.token.expose().to_string(),
                email: session.email,
                roles: session.roles,
                profile: session.profile,
            }),
            Session::Anonymous => None,
        }
    }
}

pub fn routes<U>(auth_usecase: Arc<AuthUseCase<U>>) -> Router
where
    U: UserRepository + Send + Sync + 'static,
{
    Router::new()
        .route("/login", post(login::<U>))
        .route("/logout", post(logout::<U>))
        .with_state(auth_usecase)
}

pub async fn login<U>(
    State(auth_usecase): State<Arc<AuthUseCase<U>>>,
    Json(request): Json<LoginRequest>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
{
    let credentials = LoginCredentials {
        email: request.email,
        password: request.password,
    };

    match auth_usecase.login(credentials).await {
        Ok(session) => match LoginBody::from_session(session) {
            Some(body) => (StatusCode::OK, Json(body)).into_response(),
            None => AppError::from(anyhow::anyhow!("login produced an anonymous session"))
                .into_response(),
        },
        Err(err) => AppError::from(err).into_response(),
    }
}

/// Tokens are stateless; logging out only tells the client to drop its copy.
pub async fn logout<U>(
    State(auth_usecase): State<Arc<AuthUseCase<U>>>,
    RequiredSession(session): RequiredSession,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
{
    auth_usecase.logout(session);
    StatusCode::NO_CONTENT
}
