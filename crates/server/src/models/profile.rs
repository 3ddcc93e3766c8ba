//! Seller profile types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

use sellerdesk_core::{ProfileId, UserId};

/// Onboarding sections submitted from the profile setup form.
///
/// The dashboard owns the field layout inside each section; the server only
/// requires the sections to be JSON objects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileSections {
    /// Name, phone, date of birth.
    #[serde(default)]
    pub personal: serde_json::Map<String, serde_json::Value>,
    /// Business address.
    #[serde(default)]
    pub address: serde_json::Map<String, serde_json::Value>,
    /// Store name, category, description.
    #[serde(default)]
    pub store: serde_json::Map<String, serde_json::Value>,
    /// Tax and identity document references.
    #[serde(default)]
    pub documentation: serde_json::Map<String, serde_json::Value>,
}

impl ProfileSections {
    /// `true` when every section is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.personal.is_empty()
            && self.address.is_empty()
            && self.store.is_empty()
            && self.documentation.is_empty()
    }
}

/// A stored seller profile.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Profile {
    /// Profile row id.
    pub id: ProfileId,
    /// Owning user.
    pub user_id: UserId,
    /// Personal section.
    pub personal: Json<serde_json::Map<String, serde_json::Value>>,
    /// Address section.
    pub address: Json<serde_json::Map<String, serde_json::Value>>,
    /// Store section.
    pub store: Json<serde_json::Map<String, serde_json::Value>>,
    /// Documentation section.
    pub documentation: Json<serde_json::Map<String, serde_json::Value>>,
    /// When the profile was created.
    pub created_at: DateTime<Utc>,
    /// When the profile was last updated.
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_default_missing_keys() {
        let sections: ProfileSections =
            serde_json::from_str(r#"{"store": {"name": "Pine & Co"}}"#).unwrap();
        assert!(sections.personal.is_empty());
        assert_eq!(sections.store["name"], "Pine & Co");
        assert!(!sections.is_empty());
    }

    #[test]
    fn test_sections_reject_non_objects() {
        assert!(serde_json::from_str::<ProfileSections>(r#"{"store": "Pine"}"#).is_err());
    }
}
