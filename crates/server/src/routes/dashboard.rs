//! Dashboard page.

use axum::response::Html;

use crate::middleware::RequireAuth;

/// Dashboard landing page.
///
/// GET /dashboard
///
/// The dashboard gate has already sent users without a profile to onboarding.
pub async fn index(RequireAuth(_user): RequireAuth) -> Html<&'static str> {
    Html(
        "<!doctype html><html><head><title>Dashboard</title></head>\
         <body><main id=\"dashboard\"></main></body></html>",
    )
}
