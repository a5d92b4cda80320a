use axum::{extract::State, Json};
use std::sync::Arc;
use tracing::{info, instrument};

use super::{
    service::AuthService,
    types::{LoginRequest, LoginResponse},
};
use crate::shared::{AppError, AppState, JsonBody};

/// HTTP handler for signing in
///
/// POST /api/auth/login
/// Returns a JWT and the signed-in user
#[instrument(name = "login", skip(state, request))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let service = AuthService::new(Arc::clone(&state.user_repository), state.auth.tokens.clone());
    let response = service.login(request).await?;

    info!(user_id = response.user.id, "Login succeeded");
    Ok(Json(response))
}
