// Public API - what other modules can use
pub use handlers::{create_deck, delete_deck, delete_deck_image, get_deck, list_decks, update_deck};

// Internal modules
mod handlers;
pub mod models;
pub mod repository;
pub mod service;
pub mod types;
