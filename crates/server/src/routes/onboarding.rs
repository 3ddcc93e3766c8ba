//! Onboarding (profile setup) routes.

use axum::{
    Json,
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
};
use sellerdesk_core::gate::DASHBOARD_PATH;
use tracing::{info, instrument};

use crate::db::{ProfileRepository, RepositoryError, UserRepository};
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::ProfileSections;
use crate::state::AppState;

/// Onboarding page.
///
/// GET /profile_setup
///
/// The onboarding gate sends users who already have a profile to the dashboard.
pub async fn page(RequireAuth(_user): RequireAuth) -> Html<&'static str> {
    Html(
        "<!doctype html><html><head><title>Set up your store</title></head>\
         <body><main id=\"profile-setup\"></main></body></html>",
    )
}

/// Save the onboarding profile.
///
/// POST /profile_setup
///
/// Creates the profile (or replaces its sections on resubmission) in one
/// transaction, drops the viewer snapshot, and redirects to the dashboard.
#[instrument(skip_all)]
pub async fn submit(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(sections): Json<ProfileSections>,
) -> Result<Response, AppError> {
    if sections.is_empty() {
        return Err(AppError::BadRequest("profile sections are empty".to_string()));
    }

    let external_id = user.external_id.clone();
    let result = state
        .db()
        .run_in_transaction(None, move |tx| {
            let external_id = external_id.clone();
            let sections = sections.clone();
            Box::pin(async move {
                let user_id = UserRepository::lock_id_in(tx, &external_id)
                    .await?
                    .ok_or(RepositoryError::NotFound)?;
                ProfileRepository::save_in(tx, user_id, &sections).await
            })
        })
        .await;

    let profile = match result {
        Ok(profile) => profile,
        // Provisioning webhook has not landed yet
        Err(RepositoryError::NotFound) => return Err(AppError::AuthenticationRequired),
        Err(err) => return Err(err.into()),
    };

    info!(profile_id = %profile.id, user_id = %profile.user_id, "Profile saved");
    state.viewers().invalidate(&user.external_id).await;

    Ok(Redirect::to(DASHBOARD_PATH).into_response())
}
