use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tracing::{debug, instrument};

use super::types::UserClaims;
use crate::config::AppConfig;
use crate::shared::AppError;
use crate::user::models::UserModel;

/// Configuration for JWT token operations
#[derive(Clone)]
pub struct TokenConfig {
    secret: String,
    pub expiration_hours: i64,
}

impl TokenConfig {
    pub fn new(secret: impl Into<String>, expiration_hours: i64) -> Self {
        Self {
            secret: secret.into(),
            expiration_hours,
        }
    }

    /// Creates a signed HS256 token for the given user
    #[instrument(skip(self, user), fields(user_id = user.id))]
    pub fn create_token(&self, user: &UserModel) -> Result<String, AppError> {
        let now = Utc::now();
        let exp = (now + Duration::hours(self.expiration_hours)).timestamp() as usize;

        debug!(
            expiration_hours = self.expiration_hours,
            exp_timestamp = exp,
            "Creating JWT token with expiration"
        );

        let claims = UserClaims {
            user_id: user.id,
            name: user.name.clone(),
            is_admin: user.is_admin,
            exp,
            iat: now.timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_ref()),
        )
        .map_err(|e| {
            debug!(error = %e, "Failed to encode JWT token");
            AppError::JwtError(e.to_string())
        })
    }

    /// Validates a JWT token and returns the claims if valid
    #[instrument(skip(self, token))]
    pub fn validate_token(&self, token: &str) -> Result<UserClaims, AppError> {
        decode::<UserClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_ref()),
            &Validation::default(),
        )
        .map(|data| {
            debug!(
                user_id = data.claims.user_id,
                exp = data.claims.exp,
                "JWT token decoded successfully"
            );
            data.claims
        })
        .map_err(|e| {
            debug!(error = %e, "Failed to decode JWT token");
            AppError::JwtError(e.to_string())
        })
    }
}

/// Authentication settings. With neither a static API token nor a signing
/// secret configured, the API is open.
#[derive(Clone, Default)]
pub struct AuthConfig {
    pub api_token: Option<String>,
    pub tokens: Option<TokenConfig>,
}

impl AuthConfig {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            api_token: config.api_token.clone(),
            tokens: config
                .jwt_secret
                .as_ref()
                .map(|secret| TokenConfig::new(secret.clone(), config.token_expiration_hours)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.api_token.is_some() || self.tokens.is_some()
    }
}
