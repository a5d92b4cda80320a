use axum::{extract::State, Json};
use std::sync::Arc;
use tracing::instrument;

use super::{
    models::{DeckStats, PlayerStats},
    service::StatsService,
};
use crate::shared::{AppError, AppState};

/// GET /api/stats/players
#[instrument(name = "player_stats", skip(state))]
pub async fn player_stats(State(state): State<AppState>) -> Result<Json<Vec<PlayerStats>>, AppError> {
    let service = StatsService::new(Arc::clone(&state.game_repository));
    Ok(Json(service.player_stats().await?))
}

/// GET /api/stats/decks
#[instrument(name = "deck_stats", skip(state))]
pub async fn deck_stats(State(state): State<AppState>) -> Result<Json<Vec<DeckStats>>, AppError> {
    let service = StatsService::new(Arc::clone(&state.game_repository));
    Ok(Json(service.deck_stats().await?))
}
