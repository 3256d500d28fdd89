use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use crates::{
    domain::{
        repositories::users::UserRepository,
        value_objects::{
            enums::user_roles::UserRole,
            sessions::{AccessToken, LoginCredentials, Session},
        },
    },
    infra::http::service_client::upstream_status,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

/// Claims carried by tokens the users service issues. Older tokens name a
/// single `role`; newer ones a `roles` list.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    pub exp: usize,
}

impl SessionClaims {
    pub fn user_roles(&self) -> Vec<UserRole> {
        let mut roles = Vec::new();
        for role in self.roles.iter().chain(self.role.iter()) {
            let role = UserRole::from_str(role);
            if !roles.contains(&role) {
                roles.push(role);
            }
        }
        if roles.is_empty() {
            roles.push(UserRole::User);
        }
        roles
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer credential")]
    MissingCredential,
    #[error("invalid session token")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("administrator role required")]
    Forbidden,
    #[error("user service unavailable")]
    Upstream(#[source] anyhow::Error),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingCredential
            | AuthError::InvalidToken(_)
            | AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            AuthError::Upstream(_) => "upstream",
            _ => "precondition",
        }
    }
}

pub fn validate_session_jwt(token: &str, secret: &str) -> Result<SessionClaims, AuthError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::new(Algorithm::HS256);

    let token_data = decode::<SessionClaims>(token, &decoding_key, &validation)
        .map_err(AuthError::InvalidToken)?;

    Ok(token_data.claims)
}

/// Turns a raw bearer token into a session. Used by the HTTP extractors.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait SessionAuthenticator {
    async fn authenticate(&self, raw_token: String) -> Result<Session, AuthError>;
}

/// Owns every session transition: anonymous to authenticated and back.
pub struct AuthUseCase<U>
where
    U: UserRepository + Send + Sync + 'static,
{
    user_repo: Arc<U>,
    jwt_secret: String,
}

impl<U> AuthUseCase<U>
where
    U: UserRepository + Send + Sync + 'static,
{
    pub fn new(user_repo: Arc<U>, jwt_secret: impl Into<String>) -> Self {
        Self {
            user_repo,
            jwt_secret: jwt_secret.into(),
        }
    }

    pub async fn login(&self, credentials: LoginCredentials) -> Result<Session, AuthError> {
        let email = credentials.email.trim().to_string();
        let response = self.user_repo.login(credentials).await.map_err(|err| {
            match upstream_status(&err) {
                Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::BAD_REQUEST) => {
                    warn!("auth: login rejected by user service");
                    AuthError::InvalidCredentials
                }
                _ => {
                    error!(error = ?err, "auth: login call failed");
                    AuthError::Upstream(err)
                }
            }
        })?;

        if response.token.trim().is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let roles = response
            .role
            .as_deref()
            .map(UserRole::from_str)
            .into_iter()
            .collect::<Vec<_>>();
        let session = Session::authenticated(AccessToken::new(response.token), email, roles);

        let session = self.resolve_profile(session).await?;
        info!(user_id = ?session.user_id(), "auth: login succeeded");
        Ok(session)
    }

    pub fn logout(&self, session: Session) -> Session {
        if let Some(user_id) = session.user_id() {
            info!(%user_id, "auth: session cleared");
        }
        Session::Anonymous
    }

    pub async fn resolve_profile(&self, session: Session) -> Result<Session, AuthError> {
        let token = session.token().ok_or(AuthError::MissingCredential)?.clone();

        let profile = self.user_repo.profile(token).await.map_err(|err| {
            match upstream_status(&err) {
                Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                    AuthError::InvalidCredentials
                }
                _ => {
                    error!(error = ?err, "auth: failed to resolve profile");
                    AuthError::Upstream(err)
                }
            }
        })?;

        Ok(session.with_profile(profile))
    }
}

#[async_trait]
impl<U> SessionAuthenticator for AuthUseCase<U>
where
    U: UserRepository + Send + Sync + 'static,
{
    /// A valid token whose profile cannot be loaded still yields a session;
    /// usecases that need the profile reject it themselves.
    async fn authenticate(&self, raw_token: String) -> Result<Session, AuthError> {
        let claims = validate_session_jwt(&raw_token, &self.jwt_secret)?;
        let roles = claims.user_roles();
        let session = Session::authenticated(AccessToken::new(raw_token), claims.sub, roles);

        match self.resolve_profile(session.clone()).await {
            Ok(session) => Ok(session),
            Err(AuthError::InvalidCredentials) => Err(AuthError::InvalidCredentials),
            Err(err) => {
                warn!(error = %err, "auth: continuing without a profile");
                Ok(session)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crates::{
        domain::{
            repositories::users::MockUserRepository,
            value_objects::sessions::{LoginResponse, UserProfile},
        },
        infra::http::service_client::UpstreamError,
    };
    use jsonwebtoken::{EncodingKey, Header, encode};
    use uuid::Uuid;

    const SECRET: &str = "supersecretjwtsecretforunittesting123";

    fn token_with(claims: &SessionClaims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims(exp: usize) -> SessionClaims {
        SessionClaims {
            sub: "rider@example.com".to_string(),
            role: Some("ROLE_ADMIN".to_string()),
            roles: vec![],
            exp,
        }
    }

    fn profile(user_id: Uuid) -> UserProfile {
        UserProfile {
            user_id,
            full_name: Some("Rider".to_string()),
            email: Some("rider@example.com".to_string()),
            mobile: None,
            is_active: Some(true),
        }
    }

    #[test]
    fn valid_token_decodes() {
        let token = token_with(&claims(9999999999), SECRET);

        let decoded = validate_session_jwt(&token, SECRET).unwrap();
        assert_eq!(decoded.sub, "rider@example.com");
        assert_eq!(decoded.user_roles(), vec![UserRole::Admin]);
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = token_with(&claims(1), SECRET);
        assert!(matches!(
            validate_session_jwt(&token, SECRET),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let token = token_with(&claims(9999999999), "wrongsecret");
        assert!(validate_session_jwt(&token, SECRET).is_err());
    }

    #[test]
    fn claims_without_roles_default_to_user() {
        let claims = SessionClaims {
            sub: "a@b.c".to_string(),
            role: None,
            roles: vec![],
            exp: 0,
        };
        assert_eq!(claims.user_roles(), vec![UserRole::User]);
    }

    #[tokio::test]
    async fn login_resolves_profile() {
        let user_id = Uuid::new_v4();
        let mut user_repo = MockUserRepository::new();
        user_repo.expect_login().returning(|_| {
            Box::pin(async {
                Ok(LoginResponse {
                    token: "issued".to_string(),
                    role: Some("USER".to_string()),
                    message: None,
                })
            })
        });
        user_repo
            .expect_profile()
            .withf(|token| token.expose() == "issued")
            .returning(move |_| Box::pin(async move { Ok(profile(user_id)) }));

        let usecase = AuthUseCase::new(Arc::new(user_repo), SECRET);
        let session = usecase
            .login(LoginCredentials {
                email: " rider@example.com ".to_string(),
                password: "secret".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(session.user_id(), Some(user_id));
        assert!(!session.is_admin());
        assert_eq!(usecase.logout(session), Session::Anonymous);
    }

    #[tokio::test]
    async fn rejected_login_maps_to_invalid_credentials() {
        let mut user_repo = MockUserRepository::new();
        user_repo.expect_login().returning(|_| {
            Box::pin(async {
                Err(UpstreamError {
                    service: "user-service",
                    context: "login".to_string(),
                    status: StatusCode::UNAUTHORIZED,
                    message: None,
                }
                .into())
            })
        });

        let usecase = AuthUseCase::new(Arc::new(user_repo), SECRET);
        let err = usecase
            .login(LoginCredentials {
                email: "rider@example.com".to_string(),
                password: "wrong".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn authenticate_survives_profile_outage() {
        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_profile()
            .returning(|_| Box::pin(async { Err(anyhow::anyhow!("connection refused")) }));

        let usecase = AuthUseCase::new(Arc::new(user_repo), SECRET);
        let session = usecase
            .authenticate(token_with(&claims(9999999999), SECRET))
            .await
            .unwrap();

        assert!(session.is_admin());
        assert!(session.profile().is_none());
    }

    #[tokio::test]
    async fn resolve_profile_needs_a_token() {
        let usecase = AuthUseCase::new(Arc::new(MockUserRepository::new()), SECRET);
        let err = usecase.resolve_profile(Session::Anonymous).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingCredential));
    }
}
