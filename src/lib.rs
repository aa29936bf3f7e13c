//! NexusFlow One backend: email/password signup and login issuing
//! seven-day bearer tokens, over Postgres.

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod state;

pub use app::build_app;
pub use config::AppConfig;
pub use error::AppError;
pub use state::AppState;
