use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRequest, FromRequestParts,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use strum_macros::IntoStaticStr;
use thiserror::Error;

use crate::auth::AuthConfig;
use crate::backup::repository::BackupRepository;
use crate::clock::Clock;
use crate::db::Repositories;
use crate::deck::repository::DeckRepository;
use crate::files::FileStore;
use crate::game::repository::GameRepository;
use crate::user::repository::UserRepository;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub user_repository: Arc<dyn UserRepository + Send + Sync>,
    pub deck_repository: Arc<dyn DeckRepository + Send + Sync>,
    pub game_repository: Arc<dyn GameRepository + Send + Sync>,
    pub backup_repository: Arc<dyn BackupRepository + Send + Sync>,
    pub file_store: Arc<dyn FileStore + Send + Sync>,
    pub clock: Arc<dyn Clock>,
    pub auth: AuthConfig,
}

impl AppState {
    pub fn new(
        repositories: Repositories,
        file_store: Arc<dyn FileStore + Send + Sync>,
        clock: Arc<dyn Clock>,
        auth: AuthConfig,
    ) -> Self {
        Self {
            user_repository: repositories.users,
            deck_repository: repositories.decks,
            game_repository: repositories.games,
            backup_repository: repositories.backup,
            file_store,
            clock,
            auth,
        }
    }
}

#[derive(Error, Debug, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("JWT error: {0}")]
    JwtError(String),

    #[error("Internal server error")]
    Internal,
}

impl AppError {
    /// Machine-readable category, e.g. `not_found` or `storage_failure`
    pub fn category(&self) -> &'static str {
        self.into()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

/// `Json` request body whose rejections are reported as `AppError::InvalidInput`
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// `Path` parameters whose rejections are reported as `AppError::InvalidInput`
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct PathParam<T>(pub T);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let category = self.category();
        let (status, error_message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::StorageFailure(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Storage failure: {}", msg),
            ),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::JwtError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message,
            "category": category,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AppError::NotFound("game".into()), StatusCode::NOT_FOUND, "not_found")]
    #[case(AppError::Conflict("active".into()), StatusCode::CONFLICT, "conflict")]
    #[case(AppError::InvalidInput("team".into()), StatusCode::BAD_REQUEST, "invalid_input")]
    #[case(
        AppError::StorageFailure("down".into()),
        StatusCode::INTERNAL_SERVER_ERROR,
        "storage_failure"
    )]
    #[case(AppError::Forbidden("no".into()), StatusCode::FORBIDDEN, "forbidden")]
    #[case(AppError::Internal, StatusCode::INTERNAL_SERVER_ERROR, "internal")]
    #[tokio::test]
    async fn maps_errors_to_status_and_category(
        #[case] error: AppError,
        #[case] status: StatusCode,
        #[case] category: &str,
    ) {
        let response = error.into_response();
        assert_eq!(response.status(), status);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["category"], category);
        assert!(value["error"].is_string());
    }
}
