use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::UserModel;
use crate::auth::Caller;

/// Request payload for creating or updating a user
#[derive(Debug, Deserialize)]
pub struct UserRequest {
    pub name: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub is_admin: Option<bool>,
}

/// Public view of a user. `is_admin` is only present when the viewer is an
/// admin or the user themselves.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct UserResponse {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub is_admin: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Whether `viewer` may see the admin flag of user `user_id`
pub fn can_see_admin_flag(user_id: i64, viewer: Option<&Caller>) -> bool {
    viewer
        .map(|v| v.is_admin || v.id == user_id)
        .unwrap_or(false)
}

impl UserResponse {
    pub fn for_viewer(user: &UserModel, viewer: Option<&Caller>) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            is_admin: can_see_admin_flag(user.id, viewer).then_some(user.is_admin),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}
