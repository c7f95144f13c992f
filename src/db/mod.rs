//! Database module
//!
//! Embedded SQLite store using sqlx with:
//! - Connection pool management and embedded migrations
//! - Row types with FromRow
//! - Repository functions for channels and settings

pub mod models;
pub mod pool;
pub mod repository;

use thiserror::Error;

// Re-export commonly used items
pub use models::ChannelRow;
pub use pool::{create_pool, health_check, run_migrations};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Canal não encontrado")]
    NotFound,
    #[error("Erro de banco de dados: {0}")]
    Database(#[from] sqlx::Error),
}
