use axum::{
    extract::State,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, instrument};

use super::{
    service::UserService,
    types::{UserRequest, UserResponse},
};
use crate::auth::{MaybeCaller, RequireAdmin, RequireUser};
use crate::shared::{AppError, AppState, JsonBody, PathParam};

fn service(state: &AppState) -> UserService {
    UserService::new(Arc::clone(&state.user_repository), Arc::clone(&state.clock))
}

/// GET /api/users
#[instrument(name = "list_users", skip(state, caller))]
pub async fn list_users(
    State(state): State<AppState>,
    caller: MaybeCaller,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let users = service(&state).list_users(caller.caller()).await?;
    Ok(Json(users))
}

/// GET /api/users/:id
#[instrument(name = "get_user", skip(state, caller))]
pub async fn get_user(
    State(state): State<AppState>,
    caller: MaybeCaller,
    PathParam(user_id): PathParam<i64>,
) -> Result<Json<UserResponse>, AppError> {
    let user = service(&state).get_user(user_id, caller.caller()).await?;
    Ok(Json(user))
}

/// POST /api/users (admin only)
#[instrument(name = "create_user", skip(state, admin, request))]
pub async fn create_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    JsonBody(request): JsonBody<UserRequest>,
) -> Result<(axum::http::StatusCode, Json<UserResponse>), AppError> {
    let user = service(&state).create_user(request, &admin).await?;
    info!(user_id = user.id, "User created via API");
    Ok((axum::http::StatusCode::CREATED, Json(user)))
}

/// PUT /api/users/:id (signed-in user)
#[instrument(name = "update_user", skip(state, caller, request))]
pub async fn update_user(
    State(state): State<AppState>,
    RequireUser(caller): RequireUser,
    PathParam(user_id): PathParam<i64>,
    JsonBody(request): JsonBody<UserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user = service(&state).update_user(user_id, request, &caller).await?;
    Ok(Json(user))
}

/// DELETE /api/users/:id (admin only)
#[instrument(name = "delete_user", skip(state, _admin))]
pub async fn delete_user(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    PathParam(user_id): PathParam<i64>,
) -> Result<Json<Value>, AppError> {
    service(&state).delete_user(user_id).await?;
    Ok(Json(json!({ "message": "User deleted", "id": user_id })))
}
