// Public API - what other modules can use
pub use handlers::{export_all, import_all};

// Internal modules
mod handlers;
pub mod repository;
pub mod service;
pub mod types;
