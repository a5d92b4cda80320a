// Library crate for the card-game statistics server
// This file exposes the router and modules for the binary and integration tests

pub mod auth;
pub mod backup;
pub mod clock;
pub mod config;
pub mod db;
pub mod deck;
pub mod files;
pub mod game;
pub mod shared;
pub mod stats;
pub mod user;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::path::Path;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::warn;

// Re-export commonly used types for easier access in tests
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AppConfig;
pub use db::{MemoryDb, Repositories};
pub use shared::{AppError, AppState};

/// Import archives carry inlined deck images
const IMPORT_BODY_LIMIT: usize = 64 * 1024 * 1024;

/// GET /health
async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.game_repository.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "healthy" }))),
        Err(e) => {
            warn!(error = %e, "Health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "unhealthy", "error": e.to_string() })),
            )
        }
    }
}

/// Builds the full HTTP surface. Everything under `/api` except login goes
/// through `auth::authenticate`; deck images are served from `upload_dir`.
pub fn build_router(state: AppState, upload_dir: &Path) -> Router {
    let api = Router::new()
        .route("/api/users", get(user::list_users).post(user::create_user))
        .route(
            "/api/users/:id",
            get(user::get_user)
                .put(user::update_user)
                .delete(user::delete_user),
        )
        .route("/api/decks", get(deck::list_decks).post(deck::create_deck))
        .route(
            "/api/decks/:id",
            get(deck::get_deck)
                .put(deck::update_deck)
                .delete(deck::delete_deck),
        )
        .route("/api/decks/:id/image", delete(deck::delete_deck_image))
        .route(
            "/api/games",
            get(game::list_games)
                .post(game::create_game)
                .delete(game::clear_games),
        )
        .route(
            "/api/games/active",
            get(game::get_active_game).put(game::update_active_game),
        )
        .route("/api/games/active/pause", post(game::pause_game))
        .route("/api/games/active/resume", post(game::resume_game))
        .route("/api/games/active/start-turn", post(game::start_turn))
        .route("/api/games/active/finish", post(game::finish_game))
        .route("/api/games/:id", get(game::get_game))
        .route("/api/stats/players", get(stats::player_stats))
        .route("/api/stats/decks", get(stats::deck_stats))
        .route("/api/export/all", get(backup::export_all))
        .route(
            "/api/import/all",
            post(backup::import_all).layer(DefaultBodyLimit::max(IMPORT_BODY_LIMIT)),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::authenticate,
        ));

    Router::new()
        .route("/api/auth/login", post(auth::login))
        .merge(api)
        .route("/health", get(health))
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
