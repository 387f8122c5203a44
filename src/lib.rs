pub mod auth;
pub mod config;
pub mod error;
pub mod guard;
pub mod models;
pub mod openapi;
pub mod password;
pub mod recover;
pub mod repo;
pub mod routes;

// Re-export commonly used items for tests / external users
pub use recover::Recoverer;
pub use routes::{config, AppState};
