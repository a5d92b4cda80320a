use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{debug, instrument, warn};

use super::models::{NewUser, UserModel};
use crate::db::{is_foreign_key_violation, is_unique_violation, storage_error, MemoryDb, Sequences};
use crate::shared::AppError;

/// Trait for user repository operations
#[async_trait]
pub trait UserRepository {
    /// All users, newest id first
    async fn list_users(&self) -> Result<Vec<UserModel>, AppError>;
    async fn get_user(&self, user_id: i64) -> Result<Option<UserModel>, AppError>;
    async fn find_by_name(&self, name: &str) -> Result<Option<UserModel>, AppError>;

    /// Inserts a user; a taken name yields `Conflict`
    async fn create_user(&self, user: &NewUser, now: DateTime<Utc>)
        -> Result<UserModel, AppError>;

    /// Persists name, credential hash and admin flag; `NotFound` if the row is gone
    async fn update_user(&self, user: &UserModel) -> Result<(), AppError>;

    /// Returns false when no such user exists. A user still referenced by a
    /// game yields `Conflict`.
    async fn delete_user(&self, user_id: i64) -> Result<bool, AppError>;
}

/// In-memory implementation of UserRepository for development and testing
pub struct InMemoryUserRepository {
    db: MemoryDb,
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self::new(MemoryDb::new())
    }
}

impl InMemoryUserRepository {
    pub fn new(db: MemoryDb) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    #[instrument(skip(self))]
    async fn list_users(&self) -> Result<Vec<UserModel>, AppError> {
        let tables = self.db.read().await;
        Ok(tables.data.users.values().rev().cloned().collect())
    }

    #[instrument(skip(self))]
    async fn get_user(&self, user_id: i64) -> Result<Option<UserModel>, AppError> {
        let tables = self.db.read().await;
        Ok(tables.data.users.get(&user_id).cloned())
    }

    #[instrument(skip(self))]
    async fn find_by_name(&self, name: &str) -> Result<Option<UserModel>, AppError> {
        let tables = self.db.read().await;
        Ok(tables.data.users.values().find(|u| u.name == name).cloned())
    }

    #[instrument(skip(self, user), fields(name = %user.name))]
    async fn create_user(
        &self,
        user: &NewUser,
        now: DateTime<Utc>,
    ) -> Result<UserModel, AppError> {
        let mut tables = self.db.write().await;
        if tables.data.users.values().any(|u| u.name == user.name) {
            warn!(name = %user.name, "User name already taken in memory");
            return Err(AppError::Conflict(
                "A user with this name already exists".to_string(),
            ));
        }

        let id = Sequences::next(&mut tables.sequences.users);
        let model = UserModel::from_new(id, user, now);
        tables.data.users.insert(id, model.clone());

        debug!(user_id = id, "User created in memory");
        Ok(model)
    }

    #[instrument(skip(self, user), fields(user_id = user.id))]
    async fn update_user(&self, user: &UserModel) -> Result<(), AppError> {
        let mut tables = self.db.write().await;
        if tables
            .data
            .users
            .values()
            .any(|u| u.name == user.name && u.id != user.id)
        {
            return Err(AppError::Conflict(
                "A user with this name already exists".to_string(),
            ));
        }

        match tables.data.users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(AppError::NotFound("User not found".to_string())),
        }
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, user_id: i64) -> Result<bool, AppError> {
        let mut tables = self.db.write().await;
        let referenced = tables
            .data
            .games
            .values()
            .any(|g| g.players.iter().any(|p| p.user_id == user_id));
        if referenced {
            warn!(user_id, "Refusing to delete user referenced by games");
            return Err(AppError::Conflict(
                "User has played games and cannot be deleted".to_string(),
            ));
        }

        Ok(tables.data.users.remove(&user_id).is_some())
    }
}

/// PostgreSQL implementation of user repository
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) const USER_COLUMNS: &str = "id, name, password_hash, is_admin, created_at, updated_at";

pub(crate) fn user_from_row(row: &PgRow) -> UserModel {
    UserModel {
        id: row.get("id"),
        name: row.get("name"),
        password_hash: row.get("password_hash"),
        is_admin: row.get("is_admin"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn name_conflict_or(operation: &'static str) -> impl Fn(sqlx::Error) -> AppError {
    move |e| {
        if is_unique_violation(&e) {
            AppError::Conflict("A user with this name already exists".to_string())
        } else {
            storage_error(operation)(e)
        }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    #[instrument(skip(self))]
    async fn list_users(&self) -> Result<Vec<UserModel>, AppError> {
        let rows = sqlx::query(&format!("SELECT {} FROM users ORDER BY id DESC", USER_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error("list users"))?;
        Ok(rows.iter().map(user_from_row).collect())
    }

    #[instrument(skip(self))]
    async fn get_user(&self, user_id: i64) -> Result<Option<UserModel>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error("get user"))?;
        Ok(row.as_ref().map(user_from_row))
    }

    #[instrument(skip(self))]
    async fn find_by_name(&self, name: &str) -> Result<Option<UserModel>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE name = $1", USER_COLUMNS))
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error("find user by name"))?;
        Ok(row.as_ref().map(user_from_row))
    }

    #[instrument(skip(self, user), fields(name = %user.name))]
    async fn create_user(
        &self,
        user: &NewUser,
        now: DateTime<Utc>,
    ) -> Result<UserModel, AppError> {
        let row = sqlx::query(&format!(
            "INSERT INTO users (name, password_hash, is_admin, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $4) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.is_admin)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(name_conflict_or("create user"))?;

        let model = user_from_row(&row);
        debug!(user_id = model.id, "User created in database");
        Ok(model)
    }

    #[instrument(skip(self, user), fields(user_id = user.id))]
    async fn update_user(&self, user: &UserModel) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE users SET name = $2, password_hash = $3, is_admin = $4, updated_at = $5 WHERE id = $1",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.is_admin)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(name_conflict_or("update user"))?;

        if result.rows_affected() == 0 {
            warn!(user_id = user.id, "User not found for update");
            return Err(AppError::NotFound("User not found".to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, user_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    warn!(user_id, "Refusing to delete user referenced by games");
                    AppError::Conflict("User has played games and cannot be deleted".to_string())
                } else {
                    storage_error("delete user")(e)
                }
            })?;
        Ok(result.rows_affected() > 0)
    }
}
