//! Database access for the seller dashboard.
//!
//! # Tables
//!
//! - `users` - One row per identity-provider user, written only by provisioning
//! - `profiles` - Seller onboarding data, 1:1 with `users`
//! - `tower_sessions.session` - Session storage
//!
//! # Lifecycle
//!
//! [`Database`] is constructed explicitly with [`Database::open`], handed to
//! handlers through `AppState`, and closed with [`Database::close`] during
//! graceful shutdown. Nothing in this crate holds a global pool.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p sellerdesk-cli -- migrate
//! ```

pub mod batch;
pub mod health;
pub mod profiles;
pub mod retry;
pub mod transaction;
pub mod users;

use std::borrow::Cow;
use std::time::Duration;

use secrecy::ExposeSecret;
use sellerdesk_core::transaction::{
    CONNECTION_REFUSED_CODE, POOL_TIMEOUT_CODE, Retryability, TransactionOptions, classify,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use crate::config::DatabaseConfig;

pub use batch::{DEFAULT_CHUNK_SIZE, run_batched};
pub use health::ConnectionMetrics;
pub use profiles::ProfileRepository;
pub use transaction::PgTransaction;
pub use users::{UpsertOutcome, UserRepository, UserStore};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// A transaction bound elapsed.
    #[error("{code}: transaction exceeded {}ms", .after.as_millis())]
    Timeout {
        /// Which bound elapsed.
        code: &'static str,
        /// The bound that was exceeded.
        after: Duration,
    },
}

impl RepositoryError {
    /// Error code used for retry classification and logging.
    ///
    /// `SQLSTATE` for server errors, one of the
    /// [`sellerdesk_core::transaction`] codes for client-side failures.
    #[must_use]
    pub fn code(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Database(sqlx::Error::Database(db_err)) => db_err.code(),
            Self::Database(sqlx::Error::PoolTimedOut) => Some(Cow::Borrowed(POOL_TIMEOUT_CODE)),
            Self::Database(sqlx::Error::Io(io))
                if io.kind() == std::io::ErrorKind::ConnectionRefused =>
            {
                Some(Cow::Borrowed(CONNECTION_REFUSED_CODE))
            }
            Self::Timeout { code, .. } => Some(Cow::Borrowed(code)),
            _ => None,
        }
    }

    /// Whether another attempt could succeed.
    #[must_use]
    pub fn retryability(&self) -> Retryability {
        classify(self.code().as_deref(), &self.to_string())
    }

    /// Map a unique violation to [`RepositoryError::Conflict`].
    pub(crate) fn from_unique(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(format!("{what} already exists"));
        }
        Self::Database(err)
    }
}

/// Explicitly constructed database handle.
///
/// Cheap to clone (the pool is reference counted). Carries the transaction
/// defaults from configuration so every `run_in_transaction` call site does
/// not have to.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    defaults: TransactionOptions,
}

impl Database {
    /// Connect a pool using `config`.
    ///
    /// # Errors
    ///
    /// Returns `sqlx::Error` if the connection cannot be established.
    pub async fn open(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .connect(config.url.expose_secret())
            .await?;

        tracing::info!(
            max_connections = config.max_connections,
            "Database pool opened"
        );

        Ok(Self::from_pool(pool, config.transaction))
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool, defaults: TransactionOptions) -> Self {
        Self { pool, defaults }
    }

    /// The underlying pool, for non-transactional reads and the session store.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close the pool, waiting for checked-out connections to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Database pool closed");
    }

    /// Whether [`Database::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_error_is_retryable() {
        let err = RepositoryError::Timeout {
            code: sellerdesk_core::transaction::TRANSACTION_TIMEOUT_CODE,
            after: Duration::from_secs(30),
        };
        assert_eq!(err.code().as_deref(), Some("TRANSACTION_TIMEOUT"));
        assert_eq!(err.retryability(), Retryability::Retryable);
    }

    #[test]
    fn test_pool_timeout_is_retryable() {
        let err = RepositoryError::Database(sqlx::Error::PoolTimedOut);
        assert_eq!(err.code().as_deref(), Some(POOL_TIMEOUT_CODE));
        assert!(err.retryability().is_retryable());
    }

    #[test]
    fn test_connection_refused_is_retryable() {
        let io = std::io::Error::from(std::io::ErrorKind::ConnectionRefused);
        let err = RepositoryError::Database(sqlx::Error::Io(io));
        assert_eq!(err.code().as_deref(), Some(CONNECTION_REFUSED_CODE));
        assert!(err.retryability().is_retryable());
    }

    #[test]
    fn test_domain_errors_are_fatal() {
        assert_eq!(
            RepositoryError::Conflict("email already exists".into()).retryability(),
            Retryability::Fatal
        );
        assert_eq!(RepositoryError::NotFound.retryability(), Retryability::Fatal);
        assert_eq!(
            RepositoryError::Database(sqlx::Error::RowNotFound).retryability(),
            Retryability::Fatal
        );
    }
}
