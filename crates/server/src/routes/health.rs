//! Health endpoints.

use axum::{Json, extract::State, http::StatusCode};

use crate::db::ConnectionMetrics;
use crate::state::AppState;

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn liveness() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.db().check_connection().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Connection metrics as JSON; 503 when disconnected.
pub async fn metrics(State(state): State<AppState>) -> (StatusCode, Json<ConnectionMetrics>) {
    let metrics = state.db().metrics().await;
    let status = if metrics.is_connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(metrics))
}
