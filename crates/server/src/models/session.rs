//! Session-related types.

use serde::{Deserialize, Serialize};

use sellerdesk_core::{Email, ExternalUserId};

/// Signed-in identity stored in the session.
///
/// Written by the identity provider integration after sign-in. The user row
/// may not exist yet if the provisioning webhook has not arrived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Identity provider's id for the user.
    pub external_id: ExternalUserId,
    /// Email reported at sign-in.
    pub email: Email,
}

/// Session keys for authentication data.
pub mod session_keys {
    /// Key for storing the current signed-in user.
    pub const CURRENT_USER: &str = "current_user";
}
