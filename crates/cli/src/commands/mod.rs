//! CLI command implementations.

pub mod db;
pub mod migrate;
pub mod seed;

use sellerdesk_server::config::{ConfigError, DatabaseConfig};
use sellerdesk_server::db::Database;
use thiserror::Error;

/// Errors shared by the database commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Repository operation failed.
    #[error("Repository error: {0}")]
    Repository(#[from] sellerdesk_server::db::RepositoryError),

    /// Input file problem.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The database did not answer.
    #[error("Database unreachable: {0}")]
    Unreachable(String),
}

/// Load `.env`, read the database config and open a pool.
async fn open_database() -> Result<Database, CommandError> {
    dotenvy::dotenv().ok();

    let config = DatabaseConfig::from_env()?;
    tracing::info!("Connecting to database...");
    Ok(Database::open(&config).await?)
}
