//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use sellerdesk_core::{Email, ExternalUserId, ProfileId, UserId, UserRole};

/// A provisioned dashboard user.
///
/// Rows are created and updated only by identity-provider webhooks. The
/// external id never changes once written.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    /// Internal row id.
    pub id: UserId,
    /// Identity provider's id for this user.
    pub external_id: ExternalUserId,
    /// Primary email address (unique).
    pub email: Email,
    /// Access role.
    pub role: UserRole,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Reference to a user's profile; only its existence matters to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProfileRef {
    /// Profile row id.
    pub id: ProfileId,
}

/// Answer to "who am I and have I onboarded?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentUserProfile {
    /// Internal user id.
    pub id: UserId,
    /// Primary email address.
    pub email: Email,
    /// Access role.
    pub role: UserRole,
    /// The seller's profile, once onboarding is complete.
    pub profile: Option<ProfileRef>,
}

impl CurrentUserProfile {
    /// Whether onboarding has produced a profile.
    #[must_use]
    pub const fn has_profile(&self) -> bool {
        self.profile.is_some()
    }
}
