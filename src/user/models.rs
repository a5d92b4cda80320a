use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Database model for users table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserModel {
    pub id: i64,
    pub name: String, // Unique display name
    #[serde(default)]
    pub password_hash: Option<String>, // argon2 PHC string, absent for password-less players
    #[serde(default)]
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values for inserting a new user row
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub password_hash: Option<String>,
    pub is_admin: bool,
}

impl UserModel {
    pub fn from_new(id: i64, user: &NewUser, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: user.name.clone(),
            password_hash: user.password_hash.clone(),
            is_admin: user.is_admin,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_password(&self) -> bool {
        self.password_hash
            .as_deref()
            .map(|h| !h.is_empty())
            .unwrap_or(false)
    }
}
