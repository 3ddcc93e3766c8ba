//! HTTP middleware stack for the dashboard server.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, outermost)
//! 2. `TraceLayer` (request tracing)
//! 3. Session layer (tower-sessions with `PostgreSQL` store)
//! 4. Gate (per route group: dashboard or onboarding guard)

pub mod auth;
pub mod gate;
pub mod session;

pub use auth::{OptionalAuth, RequireAuth, clear_current_user, set_current_user};
pub use gate::{dashboard_gate, onboarding_gate};
pub use session::{create_session_layer, create_session_store};
