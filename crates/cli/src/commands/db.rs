//! Database health command.

use sellerdesk_server::db::UserRepository;

use super::{CommandError, open_database};

/// Report connectivity, latency and the live user count.
///
/// # Errors
///
/// Returns `CommandError::Unreachable` if the round trip fails.
pub async fn check() -> Result<(), CommandError> {
    let db = open_database().await?;
    let metrics = db.metrics().await;

    if !metrics.is_connected {
        db.close().await;
        return Err(CommandError::Unreachable(
            metrics.error.unwrap_or_else(|| "unknown error".to_string()),
        ));
    }

    let users = UserRepository::new(db.pool()).count().await?;

    tracing::info!(
        latency_ms = metrics.query_latency_ms,
        users,
        checked_at = %metrics.timestamp.to_rfc3339(),
        "Database reachable"
    );

    db.close().await;
    Ok(())
}
