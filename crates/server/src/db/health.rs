//! Connection health checks.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{instrument, warn};

use super::Database;

/// Point-in-time connection report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionMetrics {
    /// The round trip succeeded.
    pub is_connected: bool,
    /// Round-trip latency; absent when the query failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_latency_ms: Option<u64>,
    /// Failure description; absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the check ran (RFC 3339).
    pub timestamp: DateTime<Utc>,
}

impl Database {
    /// Issue `SELECT 1`. Failures are logged and reported as `false`.
    #[instrument(skip(self))]
    pub async fn check_connection(&self) -> bool {
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => true,
            Err(err) => {
                warn!(error = %err, "Database connection check failed");
                false
            }
        }
    }

    /// Time a `SELECT 1` round trip.
    #[instrument(skip(self))]
    pub async fn metrics(&self) -> ConnectionMetrics {
        let started = Instant::now();
        let outcome = sqlx::query("SELECT 1").execute(&self.pool).await;
        let elapsed = started.elapsed();

        match outcome {
            Ok(_) => ConnectionMetrics {
                is_connected: true,
                query_latency_ms: Some(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)),
                error: None,
                timestamp: Utc::now(),
            },
            Err(err) => {
                warn!(error = %err, "Database metrics query failed");
                ConnectionMetrics {
                    is_connected: false,
                    query_latency_ms: None,
                    error: Some(err.to_string()),
                    timestamp: Utc::now(),
                }
            }
        }
    }
}
