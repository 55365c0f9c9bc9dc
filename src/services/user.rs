use tracing::info;
use validator::Validate;

use super::backend::BackendClient;
use crate::error::{AppError, AppResult};
use crate::models::{NewUser, User, UserUpdate};

/// Console user administration. Mutations return the refetched list so the
/// caller always renders what the backend actually holds.
pub struct UserService<'a> {
    backend: &'a BackendClient,
}

impl<'a> UserService<'a> {
    pub fn new(backend: &'a BackendClient) -> Self {
        UserService { backend }
    }

    pub async fn list_users(&self, access_token: &str) -> AppResult<Vec<User>> {
        self.backend.list_users(access_token).await
    }

    pub async fn create_user(&self, access_token: &str, user: &NewUser) -> AppResult<Vec<User>> {
        user.validate()?;

        self.backend.create_user(access_token, user).await?;
        info!("User created: {} ({:?})", user.email, user.role);
        self.list_users(access_token).await
    }

    pub async fn update_user(
        &self,
        access_token: &str,
        user_id: &str,
        update: &UserUpdate,
    ) -> AppResult<Vec<User>> {
        if update.is_empty() {
            return Err(AppError::BadRequest("Nothing to update".to_string()));
        }
        update.validate()?;

        self.backend.update_user(access_token, user_id, update).await?;
        info!("User {} updated", user_id);
        self.list_users(access_token).await
    }

    pub async fn delete_user(&self, access_token: &str, user_id: &str) -> AppResult<Vec<User>> {
        self.backend.delete_user(access_token, user_id).await?;
        info!("User {} deleted", user_id);
        self.list_users(access_token).await
    }
}
