//! Profile-completion gate.
//!
//! A signed-in seller must finish onboarding (create a profile) before the
//! dashboard is reachable, and a seller who already has a profile has no
//! business on the onboarding page. [`decide`] turns the current auth and
//! query state into a navigation decision. It is a pure function: callers
//! re-run it whenever any input changes, because authentication and the
//! profile query resolve independently.

use serde::{Deserialize, Serialize};

/// Path prefix of the identity provider's sign-in pages.
pub const SIGN_IN_PATH: &str = "/sign-in";
/// Path prefix of the identity provider's sign-up pages.
pub const SIGN_UP_PATH: &str = "/sign-up";
/// Path of the onboarding (profile setup) page.
pub const ONBOARDING_PATH: &str = "/profile_setup";
/// Path of the dashboard landing page.
pub const DASHBOARD_PATH: &str = "/dashboard";

/// Which guard is evaluating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Guard {
    /// Guards every protected route except onboarding.
    #[default]
    Dashboard,
    /// Guards the onboarding route itself.
    Onboarding,
}

/// Classification of a failed profile query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryErrorKind {
    /// The server does not know the caller yet (no session, or the
    /// provisioning webhook has not landed).
    AuthenticationRequired,
    /// Anything else. Treated as transient.
    Other,
}

/// What the gate wants the caller to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDecision {
    /// Inputs are still resolving; render nothing yet.
    Wait,
    /// Let the user see the route.
    AllowThrough,
    /// Send the user to [`ONBOARDING_PATH`].
    RedirectToOnboarding,
    /// Send the user to [`DASHBOARD_PATH`].
    RedirectToDashboard,
    /// This guard does not own the route.
    SkipForRoute,
}

impl GateDecision {
    /// Redirect target, if the decision is a redirect.
    #[must_use]
    pub const fn redirect_target(self) -> Option<&'static str> {
        match self {
            Self::RedirectToOnboarding => Some(ONBOARDING_PATH),
            Self::RedirectToDashboard => Some(DASHBOARD_PATH),
            Self::Wait | Self::AllowThrough | Self::SkipForRoute => None,
        }
    }
}

/// Everything the gate looks at.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GateInputs {
    /// The auth layer has finished resolving.
    pub auth_loaded: bool,
    /// A user is signed in.
    pub user_present: bool,
    /// The profile query is in flight.
    pub query_loading: bool,
    /// The profile query failed.
    pub query_error: Option<QueryErrorKind>,
    /// The profile query returned a profile.
    pub profile_present: bool,
    /// Route being rendered.
    pub route: String,
}

impl GateInputs {
    /// Inputs for a signed-in user whose query has resolved.
    #[must_use]
    pub fn resolved(
        route: impl Into<String>,
        profile_present: bool,
        query_error: Option<QueryErrorKind>,
    ) -> Self {
        Self {
            auth_loaded: true,
            user_present: true,
            query_loading: false,
            query_error,
            profile_present,
            route: route.into(),
        }
    }
}

/// Decide where the user goes. First matching rule wins.
#[must_use]
pub fn decide(guard: Guard, inputs: &GateInputs) -> GateDecision {
    if !inputs.auth_loaded {
        return GateDecision::Wait;
    }
    if !inputs.user_present {
        return GateDecision::AllowThrough;
    }

    let route = inputs.route.as_str();
    if route.starts_with(SIGN_IN_PATH) || route.starts_with(SIGN_UP_PATH) {
        return GateDecision::SkipForRoute;
    }
    if guard == Guard::Dashboard && route.starts_with(ONBOARDING_PATH) {
        return GateDecision::SkipForRoute;
    }

    if inputs.query_loading {
        return GateDecision::Wait;
    }

    match (guard, inputs.query_error, inputs.profile_present) {
        (Guard::Dashboard, Some(QueryErrorKind::AuthenticationRequired), _) => {
            GateDecision::RedirectToOnboarding
        }
        (Guard::Dashboard, None, false) => GateDecision::RedirectToOnboarding,
        (Guard::Onboarding, None | Some(QueryErrorKind::Other), true) => {
            GateDecision::RedirectToDashboard
        }
        // Profile present on the dashboard, an unknown user already on
        // onboarding, or a transient error: stay put.
        _ => GateDecision::AllowThrough,
    }
}
