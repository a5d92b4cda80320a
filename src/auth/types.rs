use serde::{Deserialize, Serialize};

use crate::user::types::UserResponse;

/// JWT claims identifying a registered user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserClaims {
    pub user_id: i64,
    pub name: String,
    pub is_admin: bool,
    pub exp: usize, // Expiration timestamp (standard JWT claim)
    pub iat: usize, // Issued at timestamp (standard JWT claim)
}

/// Identity of the caller, attached to the request by `authenticate`
#[derive(Debug, Clone, PartialEq)]
pub struct Caller {
    pub id: i64,
    pub name: String,
    pub is_admin: bool,
}

impl From<UserClaims> for Caller {
    fn from(claims: UserClaims) -> Self {
        Self {
            id: claims.user_id,
            name: claims.name,
            is_admin: claims.is_admin,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub name: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}
