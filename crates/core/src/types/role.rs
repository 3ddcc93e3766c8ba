//! User roles.

use serde::{Deserialize, Serialize};

/// Role of a dashboard user.
///
/// Stored as the `user_role` enum in PostgreSQL and serialized in upper case
/// (`"SELLER"`) to match what the dashboard front end expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    /// Signed-up user without seller privileges.
    User,
    /// Seller; the role every provisioned account receives.
    #[default]
    Seller,
    /// Platform administrator.
    Admin,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "USER"),
            Self::Seller => write!(f, "SELLER"),
            Self::Admin => write!(f, "ADMIN"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USER" => Ok(Self::User),
            "SELLER" => Ok(Self::Seller),
            "ADMIN" => Ok(Self::Admin),
            _ => Err(format!("invalid user role: {s}")),
        }
    }
}

/// What provisioning does to the stored role when a `user.updated` event
/// arrives for an existing user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RolePolicy {
    /// Reset to `SELLER` unless the user is an `ADMIN`.
    #[default]
    PreserveAdmin,
    /// Reset to `SELLER` unconditionally.
    ForceSeller,
}

impl RolePolicy {
    /// Role to store after an update, given the role currently stored.
    #[must_use]
    pub const fn role_on_update(self, current: UserRole) -> UserRole {
        match (self, current) {
            (Self::PreserveAdmin, UserRole::Admin) => UserRole::Admin,
            _ => UserRole::Seller,
        }
    }
}

impl std::str::FromStr for RolePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "preserve_admin" => Ok(Self::PreserveAdmin),
            "force_seller" => Ok(Self::ForceSeller),
            _ => Err(format!(
                "invalid role policy: {s} (expected preserve_admin or force_seller)"
            )),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_upper_case() {
        assert_eq!(
            serde_json::to_string(&UserRole::Seller).unwrap(),
            "\"SELLER\""
        );
        assert_eq!("admin".parse::<UserRole>().unwrap(), UserRole::Admin);
    }

    #[test]
    fn test_preserve_admin_never_downgrades_admin() {
        let policy = RolePolicy::PreserveAdmin;
        assert_eq!(policy.role_on_update(UserRole::Admin), UserRole::Admin);
        assert_eq!(policy.role_on_update(UserRole::User), UserRole::Seller);
        assert_eq!(policy.role_on_update(UserRole::Seller), UserRole::Seller);
    }

    #[test]
    fn test_force_seller_always_resets() {
        let policy = RolePolicy::ForceSeller;
        assert_eq!(policy.role_on_update(UserRole::Admin), UserRole::Seller);
        assert_eq!(policy.role_on_update(UserRole::User), UserRole::Seller);
    }

    #[test]
    fn test_role_policy_from_str() {
        assert_eq!(
            "force_seller".parse::<RolePolicy>().unwrap(),
            RolePolicy::ForceSeller
        );
        assert!("sometimes".parse::<RolePolicy>().is_err());
    }
}
