//! Identity-provider user id.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error returned for an empty or oversized external id.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("external user id must be 1-{max} non-whitespace characters")]
pub struct ExternalIdError {
    max: usize,
}

/// The identity provider's id for a user (e.g. `user_2abc...`).
///
/// This is the stable correlation key for provisioning: it is unique in
/// `users.external_id` and never rewritten once a row exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExternalUserId(String);

impl ExternalUserId {
    /// Column width of `users.external_id`.
    pub const MAX_LENGTH: usize = 191;

    /// Validate an external id.
    ///
    /// # Errors
    ///
    /// Returns [`ExternalIdError`] if the id is empty, contains whitespace, or
    /// exceeds [`Self::MAX_LENGTH`].
    pub fn parse(s: &str) -> Result<Self, ExternalIdError> {
        if s.is_empty() || s.len() > Self::MAX_LENGTH || s.chars().any(char::is_whitespace) {
            return Err(ExternalIdError {
                max: Self::MAX_LENGTH,
            });
        }
        Ok(Self(s.to_owned()))
    }

    /// The raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalUserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ExternalUserId {
    type Error = ExternalIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ExternalUserId> for String {
    fn from(id: ExternalUserId) -> Self {
        id.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for ExternalUserId {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for ExternalUserId {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for ExternalUserId {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}
