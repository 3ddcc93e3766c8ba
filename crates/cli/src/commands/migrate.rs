//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! sdk-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `SELLERDESK_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//!
//! # Migration Files
//!
//! Server migrations: `crates/server/migrations/`

use super::{CommandError, open_database};

/// Run the server migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let db = open_database().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../server/migrations").run(db.pool()).await?;

    tracing::info!("Migrations complete!");
    db.close().await;
    Ok(())
}
