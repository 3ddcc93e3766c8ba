//! Session routes.

use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use sellerdesk_core::gate::SIGN_IN_PATH;
use tower_sessions::Session;
use tracing::{error, info};

use crate::error::clear_sentry_user;
use crate::middleware::clear_current_user;
use crate::state::AppState;

/// Sign out.
///
/// POST /auth/logout
///
/// Clears the session and drops the viewer snapshot so open gate streams
/// re-evaluate.
pub async fn logout(State(state): State<AppState>, session: Session) -> Response {
    match clear_current_user(&session).await {
        Ok(Some(user)) => {
            info!(external_id = %user.external_id, "User signed out");
            state.viewers().invalidate(&user.external_id).await;
        }
        Ok(None) => {}
        Err(e) => error!("Failed to clear session: {}", e),
    }

    // Also destroy the entire session
    if let Err(e) = session.flush().await {
        error!("Failed to flush session: {}", e);
    }

    clear_sentry_user();

    Redirect::to(SIGN_IN_PATH).into_response()
}
