//! Client layer for the Raisket financial advisor.
//!
//! [`api::ApiClient`] talks to the chat backend; [`db::SupabaseClient`] is the
//! shared handle to the hosted tables described in [`db::models`].

pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;

pub use api::ApiClient;
pub use config::{ApiConfig, Settings, SupabaseConfig};
pub use db::SupabaseClient;
pub use errors::{ApiError, ConfigError, DbError};
pub use models::{ChatRequest, ChatResponse};
