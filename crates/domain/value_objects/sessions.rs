use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::user_roles::UserRole;

/// Bearer credential issued by the users service at login.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: Uuid,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedSession {
    pub token: AccessToken,
    pub email: String,
    pub roles: Vec<UserRole>,
    pub profile: Option<UserProfile>,
}

/// Explicit caller context handed to every usecase. There is no process-wide
/// credential; moving between states goes through the auth usecase.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Session {
    #[default]
    Anonymous,
    Authenticated(AuthenticatedSession),
}

impl Session {
    pub fn authenticated(token: AccessToken, email: impl Into<String>, roles: Vec<UserRole>) -> Self {
        Session::Authenticated(AuthenticatedSession {
            token,
            email: email.into(),
            roles,
            profile: None,
        })
    }

    pub fn with_profile(self, profile: UserProfile) -> Self {
        match self {
            Session::Authenticated(mut session) => {
                session.profile = Some(profile);
                Session::Authenticated(session)
            }
            Session::Anonymous => Session::Anonymous,
        }
    }

    pub fn token(&self) -> Option<&AccessToken> {
        match self {
            Session::Authenticated(session) => Some(&session.token),
            Session::Anonymous => None,
        }
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        match self {
            Session::Authenticated(session) => session.profile.as_ref(),
            Session::Anonymous => None,
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.profile().map(|profile| profile.user_id)
    }

    pub fn is_admin(&self) -> bool {
        match self {
            Session::Authenticated(session) => session.roles.contains(&UserRole::Admin),
            Session::Anonymous => false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_token() {
        let token = AccessToken::new("eyJhbGciOi.secret");
        assert!(!format!("{token:?}").contains("secret"));
        assert_eq!(token.bearer(), "Bearer eyJhbGciOi.secret");
    }

    #[test]
    fn anonymous_session_ignores_profile() {
        let profile = UserProfile {
            user_id: Uuid::new_v4(),
            full_name: None,
            email: None,
            mobile: None,
            is_active: None,
        };
        assert_eq!(Session::Anonymous.with_profile(profile).user_id(), None);
    }
}
