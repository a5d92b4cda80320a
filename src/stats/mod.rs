// Public API - what other modules can use
pub use handlers::{deck_stats, player_stats};
pub use models::{DeckStats, PlayerStats};
pub use service::StatsService;

// Internal modules
pub mod aggregator;
mod handlers;
pub mod models;
mod service;
