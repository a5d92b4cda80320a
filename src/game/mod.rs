// Public API - what other modules can use
pub use handlers::{
    clear_games, create_game, finish_game, get_active_game, get_game, list_games, pause_game,
    resume_game, start_turn, update_active_game,
};
pub use team::Team;

// Internal modules
mod handlers;
pub mod models;
pub mod repository;
pub mod service;
pub mod team;
pub mod timer;
pub mod types;
