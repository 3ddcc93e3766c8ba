//! Transaction executor.
//!
//! `run_in_transaction` wraps a unit of work in a `PostgreSQL` transaction and
//! retries it when the failure is transient (timeouts, refused or dropped
//! connections). All reads and writes of the unit must go through the
//! transaction handle passed to `work`; the work closure is invoked once per
//! attempt, so it must be safe to re-run from scratch.
//!
//! ```rust,ignore
//! let email = email.clone();
//! let user = db
//!     .run_in_transaction(None, move |tx| {
//!         let email = email.clone();
//!         Box::pin(async move { UserRepository::find_by_email_in(tx, &email).await })
//!     })
//!     .await?;
//! ```

use futures::future::BoxFuture;
use sellerdesk_core::transaction::{
    ACQUIRE_TIMEOUT_CODE, TRANSACTION_TIMEOUT_CODE, TransactionOptions,
};
use sqlx::{PgPool, Postgres};
use tracing::{debug, instrument, warn};

use super::retry::retry_with_backoff;
use super::{Database, RepositoryError};

/// Transaction handle passed to work closures.
pub type PgTransaction = sqlx::Transaction<'static, Postgres>;

impl Database {
    /// Run `work` inside a transaction, retrying transient failures.
    ///
    /// `options` defaults to the configured transaction defaults. The
    /// transaction commits only if `work` returns `Ok`; any error or elapsed
    /// bound rolls it back. After the last attempt the final error is returned
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt: whatever `work` returned, a
    /// `sqlx` error from begin/commit, or [`RepositoryError::Timeout`].
    #[instrument(skip_all, fields(max_retries = options.unwrap_or(self.defaults).max_retries))]
    pub async fn run_in_transaction<T, F>(
        &self,
        options: Option<TransactionOptions>,
        work: F,
    ) -> Result<T, RepositoryError>
    where
        F: for<'t> Fn(&'t mut PgTransaction) -> BoxFuture<'t, Result<T, RepositoryError>>,
    {
        let options = options.unwrap_or(self.defaults);
        let pool = &self.pool;
        let work = &work;

        retry_with_backoff(&options, RepositoryError::retryability, move |attempt| {
            attempt_once(pool, attempt, options, work)
        })
        .await
    }
}

/// One attempt: begin, run, commit, each bounded by `options`.
async fn attempt_once<T, F>(
    pool: &PgPool,
    attempt: u32,
    options: TransactionOptions,
    work: &F,
) -> Result<T, RepositoryError>
where
    F: for<'t> Fn(&'t mut PgTransaction) -> BoxFuture<'t, Result<T, RepositoryError>>,
{
    let result: Result<T, RepositoryError> = async {
        let mut tx = tokio::time::timeout(options.max_wait, pool.begin())
            .await
            .map_err(|_| RepositoryError::Timeout {
                code: ACQUIRE_TIMEOUT_CODE,
                after: options.max_wait,
            })??;

        debug!(attempt, "Transaction started");

        // Dropping `tx` on error or timeout rolls it back
        tokio::time::timeout(options.timeout, async move {
            let value = work(&mut tx).await?;
            tx.commit().await?;
            Ok::<T, RepositoryError>(value)
        })
        .await
        .map_err(|_| RepositoryError::Timeout {
            code: TRANSACTION_TIMEOUT_CODE,
            after: options.timeout,
        })?
    }
    .await;

    match &result {
        Ok(_) => debug!(attempt, "Transaction committed"),
        Err(err) => warn!(
            attempt,
            code = err.code().as_deref().unwrap_or("NONE"),
            error = %err,
            "Transaction attempt failed"
        ),
    }

    result
}
