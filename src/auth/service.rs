use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{
    password::verify_password,
    token::TokenConfig,
    types::{Caller, LoginRequest, LoginResponse},
};
use crate::shared::AppError;
use crate::user::{repository::UserRepository, types::UserResponse};

/// Service for exchanging user credentials for a signed token
pub struct AuthService {
    users: Arc<dyn UserRepository + Send + Sync>,
    tokens: Option<TokenConfig>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepository + Send + Sync>, tokens: Option<TokenConfig>) -> Self {
        Self { users, tokens }
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, AppError> {
        let tokens = self.tokens.as_ref().ok_or_else(|| {
            warn!("Login attempted but no token secret is configured");
            AppError::Unauthorized("Token sign-in is not configured".to_string())
        })?;

        let name = request.name.trim();
        let user = self.users.find_by_name(name).await?.ok_or_else(|| {
            AppError::Unauthorized("Invalid name or password".to_string())
        })?;

        let stored_hash = match user.password_hash.as_deref() {
            Some(hash) if !hash.is_empty() => hash,
            _ => {
                return Err(AppError::Unauthorized(
                    "User has no password set".to_string(),
                ))
            }
        };

        if !verify_password(&request.password, stored_hash) {
            warn!(user_id = user.id, "Wrong password on login");
            return Err(AppError::Unauthorized(
                "Invalid name or password".to_string(),
            ));
        }

        let token = tokens.create_token(&user)?;
        let caller = Caller {
            id: user.id,
            name: user.name.clone(),
            is_admin: user.is_admin,
        };

        info!(user_id = user.id, "User signed in");
        Ok(LoginResponse {
            token,
            user: UserResponse::for_viewer(&user, Some(&caller)),
        })
    }
}
