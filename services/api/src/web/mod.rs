pub mod admin;
pub mod auth;
pub mod billing;
pub mod csrf;
pub mod documents;
pub mod dto;
pub mod middleware;
pub mod profile;
pub mod rate_limit;
pub mod rest;
pub mod state;
pub mod upload;

// Re-export the router builder and its state so the binaries and tests can
// stand the server up in one call.
pub use rest::{build_router, ApiDoc};
pub use state::AppState;
