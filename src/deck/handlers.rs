use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::instrument;

use super::{
    service::DeckService,
    types::{DeckRequest, DeckResponse},
};
use crate::shared::{AppError, AppState, JsonBody, PathParam};

fn service(state: &AppState) -> DeckService {
    DeckService::new(
        Arc::clone(&state.deck_repository),
        Arc::clone(&state.file_store),
        Arc::clone(&state.clock),
    )
}

/// GET /api/decks
#[instrument(name = "list_decks", skip(state))]
pub async fn list_decks(State(state): State<AppState>) -> Result<Json<Vec<DeckResponse>>, AppError> {
    Ok(Json(service(&state).list_decks().await?))
}

/// GET /api/decks/:id
#[instrument(name = "get_deck", skip(state))]
pub async fn get_deck(
    State(state): State<AppState>,
    PathParam(deck_id): PathParam<i64>,
) -> Result<Json<DeckResponse>, AppError> {
    Ok(Json(service(&state).get_deck(deck_id).await?))
}

/// POST /api/decks
#[instrument(name = "create_deck", skip(state, request))]
pub async fn create_deck(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<DeckRequest>,
) -> Result<(StatusCode, Json<DeckResponse>), AppError> {
    let deck = service(&state).create_deck(request).await?;
    Ok((StatusCode::CREATED, Json(deck)))
}

/// PUT /api/decks/:id
#[instrument(name = "update_deck", skip(state, request))]
pub async fn update_deck(
    State(state): State<AppState>,
    PathParam(deck_id): PathParam<i64>,
    JsonBody(request): JsonBody<DeckRequest>,
) -> Result<Json<DeckResponse>, AppError> {
    Ok(Json(service(&state).rename_deck(deck_id, request).await?))
}

/// DELETE /api/decks/:id/image
#[instrument(name = "delete_deck_image", skip(state))]
pub async fn delete_deck_image(
    State(state): State<AppState>,
    PathParam(deck_id): PathParam<i64>,
) -> Result<Json<Value>, AppError> {
    let deck = service(&state).remove_images(deck_id).await?;
    Ok(Json(json!({ "message": "Deck images removed", "deck": deck })))
}

/// DELETE /api/decks/:id
#[instrument(name = "delete_deck", skip(state))]
pub async fn delete_deck(
    State(state): State<AppState>,
    PathParam(deck_id): PathParam<i64>,
) -> Result<Json<Value>, AppError> {
    service(&state).delete_deck(deck_id).await?;
    Ok(Json(json!({ "message": "Deck deleted", "id": deck_id })))
}
