//! HTTP route handlers for the dashboard server.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness
//! GET  /health/ready           - Readiness (database round trip)
//! GET  /health/metrics         - Connection metrics (JSON)
//!
//! # Identity provider
//! POST /api/webhooks/identity  - Signed user lifecycle events
//!
//! # API (session auth)
//! GET  /api/me                 - Current user and profile existence
//! GET  /api/gate/stream        - Gate decisions as server-sent events
//!
//! # Pages (behind the gate)
//! GET  /dashboard              - Dashboard (dashboard guard)
//! GET  /dashboard/{*rest}       - Dashboard sub-pages (dashboard guard)
//! GET  /profile_setup          - Onboarding (onboarding guard)
//! POST /profile_setup          - Save onboarding profile
//!
//! # Auth
//! POST /auth/logout            - Clear the session
//! ```

pub mod api;
pub mod auth;
pub mod dashboard;
pub mod health;
pub mod onboarding;
pub mod webhooks;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use sellerdesk_core::gate::{DASHBOARD_PATH, ONBOARDING_PATH};

use crate::middleware::{dashboard_gate, onboarding_gate};
use crate::state::AppState;

/// Create the health routes router.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/health/metrics", get(health::metrics))
}

/// Create the JSON API routes router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(api::me))
        .route("/gate/stream", get(api::gate_stream))
        .route("/webhooks/identity", post(webhooks::identity))
}

/// Create the gated page routes.
pub fn page_routes(state: &AppState) -> Router<AppState> {
    let dashboard = Router::new()
        .route(DASHBOARD_PATH, get(dashboard::index))
        .route(&format!("{DASHBOARD_PATH}/{{*rest}}"), get(dashboard::index))
        .route_layer(from_fn_with_state(state.clone(), dashboard_gate));

    let onboarding = Router::new()
        .route(
            ONBOARDING_PATH,
            get(onboarding::page).post(onboarding::submit),
        )
        .route_layer(from_fn_with_state(state.clone(), onboarding_gate));

    dashboard.merge(onboarding)
}

/// Create all routes for the dashboard server.
pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(health_routes())
        .nest("/api", api_routes())
        .merge(page_routes(state))
        .route("/auth/logout", post(auth::logout))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use secrecy::SecretString;
    use sellerdesk_core::transaction::TransactionOptions;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use crate::config::{DatabaseConfig, IdentityConfig, ServerConfig};
    use crate::db::Database;
    use crate::state::AppState;

    fn offline_state() -> AppState {
        let url = "postgres://sellerdesk@127.0.0.1:1/offline";
        let config = ServerConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            session_secret: SecretString::from("x".repeat(32)),
            database: DatabaseConfig {
                url: SecretString::from(url),
                max_connections: 1,
                transaction: TransactionOptions::default(),
            },
            identity: IdentityConfig::default(),
            json_logs: false,
            sentry_dsn: None,
            sentry_environment: None,
        };
        let pool = PgPoolOptions::new().connect_lazy(url).unwrap();
        AppState::new(config, Database::from_pool(pool, TransactionOptions::default()))
    }

    #[tokio::test]
    async fn test_liveness_needs_no_database() {
        let app = crate::router(offline_state());

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.as_ref(), b"ok");
    }

    #[tokio::test]
    async fn test_unsigned_webhook_is_rejected_before_storage() {
        let app = crate::router(offline_state());

        let response = app
            .oneshot(
                Request::post("/api/webhooks/identity")
                    .body(Body::from(r#"{"type":"user.created","data":{}}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
