pub mod auth;
pub mod config;
pub mod db;
pub mod dto;
pub mod errors;
pub mod handlers;
pub mod logger;
pub mod middleware;
pub mod models;
pub mod schema;
pub mod services;
pub mod storage;

// Re-export common types
pub use crate::config::AppConfig;
pub use crate::db::DbPool;
pub use crate::errors::{ApiError, ApiResult};
pub use crate::storage::FileStore;
