//! Webhook signature verification.
//!
//! The identity provider signs deliveries with the Svix scheme:
//!
//! ```text
//! signed_content = "{svix-id}.{svix-timestamp}.{body}"
//! signature      = base64(HMAC-SHA256(secret, signed_content))
//! svix-signature = "v1,<signature> [v1,<signature> ...]"
//! ```
//!
//! The shared secret is configured as `whsec_<base64 key>`.

use axum::http::HeaderMap;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretBox};
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

/// Delivery id header.
pub const HEADER_ID: &str = "svix-id";
/// Unix-seconds timestamp header.
pub const HEADER_TIMESTAMP: &str = "svix-timestamp";
/// Space-separated `v1,<sig>` list header.
pub const HEADER_SIGNATURE: &str = "svix-signature";

/// Maximum clock skew accepted between sender and receiver (5 minutes).
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

const SECRET_PREFIX: &str = "whsec_";
const SIGNATURE_VERSION: &str = "v1";

/// Error parsing a configured signing secret.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecretFormatError {
    /// The secret decoded to zero bytes.
    #[error("signing secret is empty")]
    Empty,
    /// The part after `whsec_` is not valid base64.
    #[error("signing secret is not valid base64")]
    InvalidBase64,
}

/// Error verifying a delivery.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    /// The timestamp header is not an integer.
    #[error("invalid timestamp")]
    InvalidTimestamp,
    /// The timestamp is further than the tolerance from now.
    #[error("timestamp outside tolerance")]
    TimestampOutOfTolerance,
    /// No `v1` entry matched the computed signature.
    #[error("no matching signature")]
    NoMatchingSignature,
    /// The key could not initialize the MAC.
    #[error("invalid signing key")]
    InvalidKey,
}

/// The three correlation headers of a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebhookHeaders<'a> {
    /// `svix-id`
    pub id: &'a str,
    /// `svix-timestamp`
    pub timestamp: &'a str,
    /// `svix-signature`
    pub signature: &'a str,
}

impl<'a> WebhookHeaders<'a> {
    /// Read all three headers; `None` if any is absent or not visible ASCII.
    #[must_use]
    pub fn from_header_map(headers: &'a HeaderMap) -> Option<Self> {
        let get = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

        Some(Self {
            id: get(HEADER_ID)?,
            timestamp: get(HEADER_TIMESTAMP)?,
            signature: get(HEADER_SIGNATURE)?,
        })
    }
}

/// Decoded webhook signing key.
pub struct SigningSecret(SecretBox<Vec<u8>>);

impl Clone for SigningSecret {
    fn clone(&self) -> Self {
        Self(SecretBox::new(Box::new(self.0.expose_secret().clone())))
    }
}

impl std::fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningSecret([REDACTED])")
    }
}

impl SigningSecret {
    /// Parse `whsec_<base64>`. A bare base64 key without the prefix is accepted.
    ///
    /// # Errors
    ///
    /// Returns `SecretFormatError` if the key is not base64 or decodes to nothing.
    pub fn parse(raw: &str) -> Result<Self, SecretFormatError> {
        let encoded = raw.trim();
        let encoded = encoded.strip_prefix(SECRET_PREFIX).unwrap_or(encoded);

        let key = STANDARD
            .decode(encoded)
            .map_err(|_| SecretFormatError::InvalidBase64)?;

        if key.is_empty() {
            return Err(SecretFormatError::Empty);
        }

        Ok(Self(SecretBox::new(Box::new(key))))
    }

    /// Compute the base64 signature for a delivery.
    ///
    /// # Errors
    ///
    /// Returns `SignatureError::InvalidKey` if the MAC rejects the key.
    pub fn sign(&self, id: &str, timestamp: &str, payload: &[u8]) -> Result<String, SignatureError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.0.expose_secret())
            .map_err(|_| SignatureError::InvalidKey)?;

        mac.update(id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);

        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// Verify `payload` against `headers` at time `now`.
    ///
    /// # Errors
    ///
    /// Returns `SignatureError` if the timestamp is unparseable or stale, or
    /// if no `v1` signature in the header matches.
    pub fn verify(
        &self,
        headers: &WebhookHeaders<'_>,
        payload: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), SignatureError> {
        let sent_at: i64 = headers
            .timestamp
            .trim()
            .parse()
            .map_err(|_| SignatureError::InvalidTimestamp)?;

        if now.timestamp().abs_diff(sent_at) > TIMESTAMP_TOLERANCE_SECS.unsigned_abs() {
            return Err(SignatureError::TimestampOutOfTolerance);
        }

        let expected = self.sign(headers.id, headers.timestamp, payload)?;

        let matched = headers
            .signature
            .split_whitespace()
            .filter_map(|entry| entry.split_once(','))
            .filter(|(version, _)| *version == SIGNATURE_VERSION)
            .any(|(_, candidate)| constant_time_compare(&expected, candidate));

        if !matched {
            return Err(SignatureError::NoMatchingSignature);
        }

        debug!(webhook_id = headers.id, "Webhook signature verified");
        Ok(())
    }
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
