use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, instrument};

use super::{
    service::GameService,
    types::{CreateGameRequest, FinishGameRequest, GameResponse, UpdateActiveGameRequest},
};
use crate::auth::RequireAdmin;
use crate::shared::{AppError, AppState, JsonBody, PathParam};

fn service(state: &AppState) -> GameService {
    GameService::new(
        Arc::clone(&state.game_repository),
        Arc::clone(&state.user_repository),
        Arc::clone(&state.deck_repository),
        Arc::clone(&state.clock),
    )
}

/// GET /api/games
#[instrument(name = "list_games", skip(state))]
pub async fn list_games(State(state): State<AppState>) -> Result<Json<Vec<GameResponse>>, AppError> {
    Ok(Json(service(&state).list_games().await?))
}

/// GET /api/games/:id
#[instrument(name = "get_game", skip(state))]
pub async fn get_game(
    State(state): State<AppState>,
    PathParam(game_id): PathParam<i64>,
) -> Result<Json<GameResponse>, AppError> {
    Ok(Json(service(&state).get_game(game_id).await?))
}

/// POST /api/games
#[instrument(name = "create_game", skip(state, request))]
pub async fn create_game(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CreateGameRequest>,
) -> Result<(StatusCode, Json<GameResponse>), AppError> {
    let game = service(&state).create_game(request).await?;
    Ok((StatusCode::CREATED, Json(game)))
}

/// DELETE /api/games (admin only)
#[instrument(name = "clear_games", skip(state, admin), fields(admin_id = admin.id))]
pub async fn clear_games(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<Json<Value>, AppError> {
    let deleted = service(&state).clear_games().await?;
    info!(deleted, "Games cleared via API");
    Ok(Json(json!({ "message": "Games and turns cleared", "deleted": deleted })))
}

/// GET /api/games/active
#[instrument(name = "get_active_game", skip(state))]
pub async fn get_active_game(State(state): State<AppState>) -> Result<Json<GameResponse>, AppError> {
    Ok(Json(service(&state).active_game().await?))
}

/// PUT /api/games/active
#[instrument(name = "update_active_game", skip(state, request))]
pub async fn update_active_game(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<UpdateActiveGameRequest>,
) -> Result<Json<GameResponse>, AppError> {
    Ok(Json(service(&state).update_active(request).await?))
}

/// POST /api/games/active/pause
#[instrument(name = "pause_game", skip(state))]
pub async fn pause_game(State(state): State<AppState>) -> Result<Json<GameResponse>, AppError> {
    Ok(Json(service(&state).pause().await?))
}

/// POST /api/games/active/resume
#[instrument(name = "resume_game", skip(state))]
pub async fn resume_game(State(state): State<AppState>) -> Result<Json<GameResponse>, AppError> {
    Ok(Json(service(&state).resume().await?))
}

/// POST /api/games/active/start-turn
#[instrument(name = "start_turn", skip(state))]
pub async fn start_turn(State(state): State<AppState>) -> Result<Json<GameResponse>, AppError> {
    Ok(Json(service(&state).start_turn().await?))
}

/// POST /api/games/active/finish
#[instrument(name = "finish_game", skip(state, request))]
pub async fn finish_game(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<FinishGameRequest>,
) -> Result<Json<GameResponse>, AppError> {
    Ok(Json(service(&state).finish(request).await?))
}
