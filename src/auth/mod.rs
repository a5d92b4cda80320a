// Public API - what other modules can use
pub use handlers::login;
pub use middleware::{authenticate, MaybeCaller, RequireAdmin, RequireUser};
pub use token::{AuthConfig, TokenConfig};
pub use types::{Caller, UserClaims};

// Internal modules
mod handlers;
mod middleware;
pub mod password;
mod service;
mod token;
pub mod types;
