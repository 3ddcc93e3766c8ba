//! Profile completion gate middleware.
//!
//! Wraps the dashboard routes with the `Dashboard` guard and the onboarding
//! route with the `Onboarding` guard. Inputs come from the session (auth is
//! always loaded once the session layer has run) and the viewer store.

use axum::{
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use sellerdesk_core::gate::{GateDecision, GateInputs, Guard, decide};
use tracing::debug;

use super::auth::OptionalAuth;
use crate::models::CurrentUser;
use crate::state::AppState;

/// Gate for dashboard pages.
pub async fn dashboard_gate(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    request: Request,
    next: Next,
) -> Response {
    apply(Guard::Dashboard, &state, user.as_ref(), request, next).await
}

/// Gate for the onboarding page.
pub async fn onboarding_gate(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    request: Request,
    next: Next,
) -> Response {
    apply(Guard::Onboarding, &state, user.as_ref(), request, next).await
}

/// Compute the gate inputs for `user` on `route`.
pub async fn inputs_for(state: &AppState, user: Option<&CurrentUser>, route: &str) -> GateInputs {
    match user {
        None => GateInputs {
            auth_loaded: true,
            user_present: false,
            route: route.to_owned(),
            ..GateInputs::default()
        },
        Some(user) => state
            .viewers()
            .load(state.db(), &user.external_id)
            .await
            .gate_inputs(route),
    }
}

async fn apply(
    guard: Guard,
    state: &AppState,
    user: Option<&CurrentUser>,
    request: Request,
    next: Next,
) -> Response {
    let route = request.uri().path().to_owned();
    let inputs = inputs_for(state, user, &route).await;
    let decision = decide(guard, &inputs);

    debug!(?guard, ?decision, route = %route, "Gate decision");

    if let Some(target) = decision.redirect_target() {
        return Redirect::to(target).into_response();
    }

    match decision {
        GateDecision::Wait => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::RETRY_AFTER, "1")],
        )
            .into_response(),
        _ => next.run(request).await,
    }
}
