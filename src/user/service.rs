use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::{
    models::NewUser,
    repository::UserRepository,
    types::{UserRequest, UserResponse},
};
use crate::auth::{password::hash_password, Caller};
use crate::clock::Clock;
use crate::shared::AppError;

const NAME_MIN_CHARS: usize = 2;
const NAME_MAX_CHARS: usize = 100;

/// Service for handling user business logic
pub struct UserService {
    repository: Arc<dyn UserRepository + Send + Sync>,
    clock: Arc<dyn Clock>,
}

/// Trims and length-checks a user name
pub fn normalize_name(raw: &str) -> Result<String, AppError> {
    let name = raw.trim();
    let len = name.chars().count();
    if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&len) {
        return Err(AppError::InvalidInput(format!(
            "Name must be {} to {} characters",
            NAME_MIN_CHARS, NAME_MAX_CHARS
        )));
    }
    Ok(name.to_string())
}

fn hash_optional_password(password: Option<&str>) -> Result<Option<String>, AppError> {
    match password {
        Some(p) if !p.is_empty() => hash_password(p).map(Some),
        _ => Ok(None),
    }
}

impl UserService {
    pub fn new(repository: Arc<dyn UserRepository + Send + Sync>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    #[instrument(skip(self, viewer))]
    pub async fn list_users(&self, viewer: Option<&Caller>) -> Result<Vec<UserResponse>, AppError> {
        let users = self.repository.list_users().await?;
        debug!(user_count = users.len(), "Users listed");
        Ok(users
            .iter()
            .map(|u| UserResponse::for_viewer(u, viewer))
            .collect())
    }

    #[instrument(skip(self, viewer))]
    pub async fn get_user(
        &self,
        user_id: i64,
        viewer: Option<&Caller>,
    ) -> Result<UserResponse, AppError> {
        let user = self
            .repository
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        Ok(UserResponse::for_viewer(&user, viewer))
    }

    /// Registers a user. Callers are expected to be admins (checked by the handler).
    #[instrument(skip(self, request, admin), fields(name = %request.name))]
    pub async fn create_user(
        &self,
        request: UserRequest,
        admin: &Caller,
    ) -> Result<UserResponse, AppError> {
        let name = normalize_name(&request.name)?;
        let new_user = NewUser {
            name,
            password_hash: hash_optional_password(request.password.as_deref())?,
            is_admin: request.is_admin.unwrap_or(false),
        };

        let user = self
            .repository
            .create_user(&new_user, self.clock.now())
            .await?;

        info!(user_id = user.id, name = %user.name, "User created");
        Ok(UserResponse::for_viewer(&user, Some(admin)))
    }

    /// Admins may edit anyone; other users only themselves and never the admin flag
    #[instrument(skip(self, request, caller), fields(caller_id = caller.id))]
    pub async fn update_user(
        &self,
        user_id: i64,
        request: UserRequest,
        caller: &Caller,
    ) -> Result<UserResponse, AppError> {
        let name = normalize_name(&request.name)?;

        let mut user = self
            .repository
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let is_self = caller.id == user.id;
        if !caller.is_admin && !is_self {
            return Err(AppError::Forbidden(
                "You can only edit your own profile".to_string(),
            ));
        }
        if request.is_admin.is_some() && !caller.is_admin {
            return Err(AppError::Forbidden(
                "Only an administrator can change is_admin".to_string(),
            ));
        }

        user.name = name;
        if let Some(hash) = hash_optional_password(request.password.as_deref())? {
            user.password_hash = Some(hash);
        }
        if let Some(is_admin) = request.is_admin {
            user.is_admin = is_admin;
        }
        user.updated_at = self.clock.now();

        self.repository.update_user(&user).await?;

        info!(user_id = user.id, "User updated");
        Ok(UserResponse::for_viewer(&user, Some(caller)))
    }

    /// Creates the bootstrap administrator unless a user with that name
    /// already exists. Returns whether a user was created.
    #[instrument(skip(self, password))]
    pub async fn ensure_admin(&self, name: &str, password: &str) -> Result<bool, AppError> {
        let name = normalize_name(name)?;
        if password.is_empty() {
            return Err(AppError::InvalidInput(
                "Administrator password must not be empty".to_string(),
            ));
        }
        if self.repository.find_by_name(&name).await?.is_some() {
            debug!(name = %name, "Bootstrap administrator already present");
            return Ok(false);
        }

        let new_user = NewUser {
            name,
            password_hash: Some(hash_password(password)?),
            is_admin: true,
        };
        match self.repository.create_user(&new_user, self.clock.now()).await {
            Ok(user) => {
                info!(user_id = user.id, name = %user.name, "Bootstrap administrator created");
                Ok(true)
            }
            // another instance seeded it first
            Err(AppError::Conflict(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    pub async fn delete_user(&self, user_id: i64) -> Result<(), AppError> {
        if !self.repository.delete_user(user_id).await? {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        info!(user_id, "User deleted");
        Ok(())
    }
}
