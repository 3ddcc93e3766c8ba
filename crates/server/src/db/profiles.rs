//! Profile repository.

use sellerdesk_core::UserId;
use sqlx::PgConnection;
use sqlx::types::Json;
use tracing::instrument;

use super::RepositoryError;
use crate::models::{Profile, ProfileSections};

/// Repository for seller profiles.
///
/// Profiles are only written during onboarding, always inside a
/// transaction together with the user lookup.
pub struct ProfileRepository;

impl ProfileRepository {
    /// Insert the user's profile, or replace its sections if one exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the statement fails.
    #[instrument(skip(conn, sections), fields(user_id = %user_id))]
    pub async fn save_in(
        conn: &mut PgConnection,
        user_id: UserId,
        sections: &ProfileSections,
    ) -> Result<Profile, RepositoryError> {
        let profile = sqlx::query_as::<_, Profile>(
            r"
            INSERT INTO profiles (user_id, personal, address, store, documentation)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id) DO UPDATE
            SET personal = EXCLUDED.personal,
                address = EXCLUDED.address,
                store = EXCLUDED.store,
                documentation = EXCLUDED.documentation,
                updated_at = NOW()
            RETURNING id, user_id, personal, address, store, documentation,
                      created_at, updated_at
            ",
        )
        .bind(user_id)
        .bind(Json(&sections.personal))
        .bind(Json(&sections.address))
        .bind(Json(&sections.store))
        .bind(Json(&sections.documentation))
        .fetch_one(&mut *conn)
        .await?;

        Ok(profile)
    }
}
