use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::value_objects::sessions::{
    AccessToken, LoginCredentials, LoginResponse, UserProfile,
};

#[async_trait]
#[automock]
pub trait UserRepository {
    async fn login(&self, credentials: LoginCredentials) -> Result<LoginResponse>;
    async fn profile(&self, token: AccessToken) -> Result<UserProfile>;
    async fn find_display_name(&self, token: AccessToken, user_id: Uuid) -> Result<String>;
}
