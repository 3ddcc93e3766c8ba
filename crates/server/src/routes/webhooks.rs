//! Identity provider webhook route.

use axum::{Json, body::Bytes, extract::State, http::HeaderMap};
use chrono::Utc;
use tracing::instrument;

use crate::error::{AppError, add_breadcrumb};
use crate::state::AppState;
use crate::webhooks::{ProvisioningOutcome, handle_delivery};

/// Handle a signed user lifecycle event.
///
/// POST /api/webhooks/identity
///
/// The body is read as raw bytes; the signature covers them exactly.
#[instrument(skip_all)]
pub async fn identity(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ProvisioningOutcome>, AppError> {
    let outcome = handle_delivery(
        state.db(),
        &state.config().identity,
        &headers,
        &body,
        Utc::now(),
    )
    .await?;

    if let Some(external_id) = outcome.external_id() {
        state.viewers().invalidate(external_id).await;
        add_breadcrumb(
            "webhook",
            "User provisioned",
            Some(&[("external_id", external_id.as_str())]),
        );
    }

    Ok(Json(outcome))
}
