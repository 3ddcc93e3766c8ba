//! JSON API routes.

use std::convert::Infallible;

use axum::{
    Json,
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, instrument};

use sellerdesk_core::gate::{DASHBOARD_PATH, GateDecision, GateInputs, Guard, decide};

use crate::error::{AppError, set_sentry_user};
use crate::middleware::gate::inputs_for;
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::CurrentUserProfile;
use crate::services::ViewerSnapshot;
use crate::state::AppState;

/// Current user and profile existence.
///
/// GET /api/me
///
/// 401 `{"error": "AUTHENTICATION_REQUIRED"}` when nobody is signed in or the
/// signed-in user has not been provisioned yet.
#[instrument(skip_all)]
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<CurrentUserProfile>, AppError> {
    let snapshot = state.viewers().load(state.db(), &user.external_id).await;

    match snapshot {
        ViewerSnapshot {
            user: Some(profile),
            ..
        } => {
            set_sentry_user(&profile.id, Some(profile.email.as_str()));
            Ok(Json(profile))
        }
        ViewerSnapshot {
            error: Some(sellerdesk_core::gate::QueryErrorKind::Other),
            ..
        } => Err(AppError::Internal("profile query failed".to_string())),
        ViewerSnapshot { .. } => Err(AppError::AuthenticationRequired),
    }
}

/// Query parameters for the gate stream.
#[derive(Debug, Deserialize)]
pub struct GateStreamParams {
    /// Which guard to evaluate.
    #[serde(default)]
    pub guard: Guard,
    /// Route the client is rendering.
    #[serde(default = "default_route")]
    pub route: String,
}

fn default_route() -> String {
    DASHBOARD_PATH.to_string()
}

/// One gate decision as sent to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateEvent {
    /// The decision.
    pub decision: GateDecision,
    /// Where to navigate, for redirect decisions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<&'static str>,
}

impl GateEvent {
    /// Evaluate `guard` on `inputs`.
    #[must_use]
    pub fn evaluate(guard: Guard, inputs: &GateInputs) -> Self {
        let decision = decide(guard, inputs);
        Self {
            decision,
            redirect_to: decision.redirect_target(),
        }
    }

    fn into_sse(self) -> Event {
        let json = serde_json::to_string(&self).unwrap_or_else(|_| {
            r#"{"decision":"allow_through"}"#.to_string()
        });
        Event::default().event("gate").data(json)
    }
}

/// Stream gate decisions for the signed-in user.
///
/// GET /api/gate/stream?guard=dashboard&route=/dashboard
///
/// Emits `wait` while the profile query is in flight, then the resolved
/// decision, then a fresh decision whenever the viewer's snapshot changes
/// (provisioning, onboarding, logout). Signed-out callers get a single
/// decision and the stream ends.
pub async fn gate_stream(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Query(params): Query<GateStreamParams>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let GateStreamParams { guard, route } = params;

    let stream = async_stream::stream! {
        let Some(user) = user else {
            let inputs = inputs_for(&state, None, &route).await;
            yield Ok(GateEvent::evaluate(guard, &inputs).into_sse());
            return;
        };

        // Subscribe first so no change between load and wait is missed
        let mut changes = state.viewers().subscribe();

        let loading = GateInputs {
            query_loading: true,
            ..GateInputs::resolved(route.as_str(), false, None)
        };
        yield Ok(GateEvent::evaluate(guard, &loading).into_sse());

        loop {
            let inputs = inputs_for(&state, Some(&user), &route).await;
            let event = GateEvent::evaluate(guard, &inputs);
            debug!(external_id = %user.external_id, decision = ?event.decision, "Gate stream decision");
            yield Ok(event.into_sse());

            loop {
                match changes.recv().await {
                    Ok(changed) if changed == user.external_id => break,
                    Ok(_) => {}
                    Err(RecvError::Lagged(_)) => break,
                    Err(RecvError::Closed) => return,
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_loading_inputs_wait() {
        let loading = GateInputs {
            query_loading: true,
            ..GateInputs::resolved("/dashboard", false, None)
        };
        let event = GateEvent::evaluate(Guard::Dashboard, &loading);
        assert_eq!(event.decision, GateDecision::Wait);
        assert_eq!(event.redirect_to, None);
    }

    #[test]
    fn test_redirect_event_carries_target() {
        let inputs = ViewerSnapshot::unknown().gate_inputs("/dashboard");
        let event = GateEvent::evaluate(Guard::Dashboard, &inputs);
        assert_eq!(event.decision, GateDecision::RedirectToOnboarding);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["decision"], "redirect_to_onboarding");
        assert_eq!(json["redirect_to"], "/profile_setup");
    }

    #[test]
    fn test_allow_event_omits_target() {
        let inputs = ViewerSnapshot::failed().gate_inputs("/dashboard");
        let json = serde_json::to_value(GateEvent::evaluate(Guard::Dashboard, &inputs)).unwrap();
        assert_eq!(json["decision"], "allow_through");
        assert!(json.get("redirect_to").is_none());
    }

    #[test]
    fn test_stream_params_default_to_dashboard() {
        let params: GateStreamParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.guard, Guard::Dashboard);
        assert_eq!(params.route, "/dashboard");
    }
}
