//! Identity provider user provisioning.
//!
//! A delivery is verified, classified by event type, and (for user
//! lifecycle events) turned into an idempotent upsert keyed by the
//! provider's user id. Replaying the same delivery converges on one row.

use axum::http::{HeaderMap, StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

use sellerdesk_core::{Email, ExternalUserId, UserId};

use super::signature::{SignatureError, WebhookHeaders};
use crate::config::IdentityConfig;
use crate::db::{RepositoryError, UpsertOutcome, UserStore};

/// Event emitted when a user signs up with the identity provider.
pub const EVENT_USER_CREATED: &str = "user.created";
/// Event emitted when a user changes their account.
pub const EVENT_USER_UPDATED: &str = "user.updated";

/// Provisioning failures, one per response class.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// One of the correlation headers is absent.
    #[error("missing webhook headers")]
    MissingHeaders,

    /// No signing secret is configured on this server.
    #[error("webhook signing secret is not configured")]
    MisconfiguredSecret,

    /// The delivery failed verification.
    #[error("invalid webhook signature: {0}")]
    InvalidSignature(#[from] SignatureError),

    /// The body is not a usable event.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The upsert failed after the executor's retries.
    #[error("failed to persist user: {0}")]
    PersistenceError(#[from] RepositoryError),
}

impl ProvisioningError {
    /// HTTP status for this failure.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingHeaders | Self::InvalidSignature(_) | Self::MalformedPayload(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::MisconfiguredSecret | Self::PersistenceError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// What a delivery did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProvisioningOutcome {
    /// A new user row was inserted.
    Created {
        /// Internal id of the new row.
        user_id: UserId,
        /// Provider id of the user.
        external_id: ExternalUserId,
    },
    /// An existing user row was updated.
    Updated {
        /// Internal id of the row.
        user_id: UserId,
        /// Provider id of the user.
        external_id: ExternalUserId,
    },
    /// The event type is not one this server acts on.
    Ignored {
        /// The unrecognized event type.
        event_type: String,
    },
}

impl ProvisioningOutcome {
    /// Provider id of the affected user, if any row was touched.
    #[must_use]
    pub const fn external_id(&self) -> Option<&ExternalUserId> {
        match self {
            Self::Created { external_id, .. } | Self::Updated { external_id, .. } => {
                Some(external_id)
            }
            Self::Ignored { .. } => None,
        }
    }
}

/// Envelope of every delivery. `data` is only interpreted for user events.
#[derive(Debug, Deserialize)]
pub struct IdentityEvent {
    /// Event type, e.g. `user.created`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Event body.
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Body of `user.created` / `user.updated`.
#[derive(Debug, Deserialize)]
pub struct UserEventData {
    /// Provider user id.
    pub id: String,
    /// All addresses on the account, primary first.
    #[serde(default)]
    pub email_addresses: Vec<EmailAddressData>,
}

/// One email address on a provider account.
#[derive(Debug, Deserialize)]
pub struct EmailAddressData {
    /// The address itself.
    pub email_address: String,
}

impl UserEventData {
    /// The first listed address.
    #[must_use]
    pub fn primary_email(&self) -> Option<&str> {
        self.email_addresses
            .first()
            .map(|entry| entry.email_address.as_str())
    }
}

/// Verify, classify and apply one delivery.
///
/// # Errors
///
/// Returns `ProvisioningError`; see [`ProvisioningError::status_code`] for
/// how each maps to a response.
#[instrument(
    skip_all,
    fields(webhook_id = tracing::field::Empty, event_type = tracing::field::Empty)
)]
pub async fn handle_delivery<S>(
    store: &S,
    config: &IdentityConfig,
    headers: &HeaderMap,
    payload: &[u8],
    now: DateTime<Utc>,
) -> Result<ProvisioningOutcome, ProvisioningError>
where
    S: UserStore + ?Sized,
{
    let headers = WebhookHeaders::from_header_map(headers).ok_or_else(|| {
        warn!("Webhook delivery missing correlation headers");
        ProvisioningError::MissingHeaders
    })?;
    tracing::Span::current().record("webhook_id", headers.id);

    let secret = config.webhook_secret.as_ref().ok_or_else(|| {
        tracing::error!("IDENTITY_WEBHOOK_SECRET is not configured");
        ProvisioningError::MisconfiguredSecret
    })?;

    secret.verify(&headers, payload, now).map_err(|err| {
        warn!(error = %err, "Webhook signature rejected");
        ProvisioningError::InvalidSignature(err)
    })?;

    let event: IdentityEvent = serde_json::from_slice(payload)
        .map_err(|e| ProvisioningError::MalformedPayload(e.to_string()))?;
    tracing::Span::current().record("event_type", event.kind.as_str());

    if event.kind != EVENT_USER_CREATED && event.kind != EVENT_USER_UPDATED {
        info!("Ignoring unhandled identity event");
        return Ok(ProvisioningOutcome::Ignored {
            event_type: event.kind,
        });
    }

    let data: UserEventData = serde_json::from_value(event.data)
        .map_err(|e| ProvisioningError::MalformedPayload(e.to_string()))?;

    let external_id = ExternalUserId::parse(&data.id)
        .map_err(|e| ProvisioningError::MalformedPayload(e.to_string()))?;

    let email = data
        .primary_email()
        .ok_or_else(|| ProvisioningError::MalformedPayload("no email address".to_string()))
        .and_then(|raw| {
            Email::parse(raw).map_err(|e| ProvisioningError::MalformedPayload(e.to_string()))
        })?;

    let outcome = store
        .upsert_from_identity(&external_id, &email, config.role_policy)
        .await?;

    let user_id = outcome.user().id;
    info!(
        user_id = %user_id,
        external_id = %external_id,
        created = outcome.was_created(),
        "User provisioned"
    );

    Ok(match outcome {
        UpsertOutcome::Created(_) => ProvisioningOutcome::Created {
            user_id,
            external_id,
        },
        UpsertOutcome::Updated(_) => ProvisioningOutcome::Updated {
            user_id,
            external_id,
        },
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use axum::http::HeaderValue;
    use sellerdesk_core::{ProfileId, RolePolicy, UserRole};

    use super::*;
    use crate::models::{CurrentUserProfile, ProfileRef, User};
    use crate::webhooks::signature::{
        HEADER_ID, HEADER_SIGNATURE, HEADER_TIMESTAMP, SigningSecret,
    };

    pub(crate) const SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";

    /// `UserStore` backed by a map, counting upsert calls.
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        users: Mutex<HashMap<ExternalUserId, User>>,
        profiles: Mutex<HashSet<ExternalUserId>>,
        pub(crate) upserts: AtomicUsize,
        pub(crate) fail_with: Mutex<Option<fn() -> RepositoryError>>,
    }

    impl MemoryStore {
        pub(crate) fn with_user(external_id: &str, email: &str, role: UserRole) -> Self {
            let store = Self::default();
            let user = make_user(1, external_id, email, role);
            store
                .users
                .lock()
                .unwrap()
                .insert(user.external_id.clone(), user);
            store
        }

        /// Mark the user as onboarded.
        pub(crate) fn add_profile(&self, external_id: &str) {
            let key = ExternalUserId::parse(external_id).unwrap();
            self.profiles.lock().unwrap().insert(key);
        }

        pub(crate) fn len(&self) -> usize {
            self.users.lock().unwrap().len()
        }

        pub(crate) fn get(&self, external_id: &str) -> Option<User> {
            let key = ExternalUserId::parse(external_id).unwrap();
            self.users.lock().unwrap().get(&key).cloned()
        }
    }

    fn make_user(id: i64, external_id: &str, email: &str, role: UserRole) -> User {
        let now = Utc::now();
        User {
            id: UserId::new(id),
            external_id: ExternalUserId::parse(external_id).unwrap(),
            email: Email::parse(email).unwrap(),
            role,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[async_trait]
    impl UserStore for MemoryStore {
        async fn upsert_from_identity(
            &self,
            external_id: &ExternalUserId,
            email: &Email,
            policy: RolePolicy,
        ) -> Result<UpsertOutcome, RepositoryError> {
            self.upserts.fetch_add(1, Ordering::SeqCst);
            if let Some(fail) = *self.fail_with.lock().unwrap() {
                return Err(fail());
            }

            let mut users = self.users.lock().unwrap();
            if let Some(user) = users.get_mut(external_id) {
                user.email = email.clone();
                user.role = policy.role_on_update(user.role);
                user.updated_at = Utc::now();
                return Ok(UpsertOutcome::Updated(user.clone()));
            }

            let next_id = i64::try_from(users.len()).unwrap() + 1;
            let user = make_user(next_id, external_id.as_str(), email.as_str(), UserRole::Seller);
            users.insert(external_id.clone(), user.clone());
            Ok(UpsertOutcome::Created(user))
        }

        async fn current_user_profile(
            &self,
            external_id: &ExternalUserId,
        ) -> Result<Option<CurrentUserProfile>, RepositoryError> {
            if let Some(fail) = *self.fail_with.lock().unwrap() {
                return Err(fail());
            }

            let onboarded = self.profiles.lock().unwrap().contains(external_id);
            Ok(self
                .users
                .lock()
                .unwrap()
                .get(external_id)
                .map(|user| CurrentUserProfile {
                    id: user.id,
                    email: user.email.clone(),
                    role: user.role,
                    profile: onboarded.then(|| ProfileRef {
                        id: ProfileId::new(user.id.as_i64()),
                    }),
                }))
        }
    }

    pub(crate) fn config() -> IdentityConfig {
        IdentityConfig {
            webhook_secret: Some(SigningSecret::parse(SECRET).unwrap()),
            role_policy: RolePolicy::default(),
        }
    }

    pub(crate) fn user_event(kind: &str, id: &str, email: &str) -> Vec<u8> {
        serde_json::json!({
            "type": kind,
            "object": "event",
            "data": {
                "id": id,
                "email_addresses": [{"id": "idn_1", "email_address": email}],
                "primary_email_address_id": "idn_1"
            }
        })
        .to_string()
        .into_bytes()
    }

    pub(crate) fn signed_headers(payload: &[u8], now: DateTime<Utc>) -> HeaderMap {
        let secret = SigningSecret::parse(SECRET).unwrap();
        let timestamp = now.timestamp().to_string();
        let signature = secret.sign("msg_1", &timestamp, payload).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(HEADER_ID, HeaderValue::from_static("msg_1"));
        headers.insert(HEADER_TIMESTAMP, HeaderValue::from_str(&timestamp).unwrap());
        headers.insert(
            HEADER_SIGNATURE,
            HeaderValue::from_str(&format!("v1,{signature}")).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn test_replayed_create_converges_on_one_row() {
        let store = MemoryStore::default();
        let config = config();
        let now = Utc::now();
        let payload = user_event(EVENT_USER_CREATED, "user_2abc", "seller@shop.example");
        let headers = signed_headers(&payload, now);

        let first = handle_delivery(&store, &config, &headers, &payload, now)
            .await
            .unwrap();
        let second = handle_delivery(&store, &config, &headers, &payload, now)
            .await
            .unwrap();

        assert!(matches!(first, ProvisioningOutcome::Created { .. }));
        assert!(matches!(second, ProvisioningOutcome::Updated { .. }));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("user_2abc").unwrap().role, UserRole::Seller);
    }

    #[tokio::test]
    async fn test_missing_signature_header_never_upserts() {
        let store = MemoryStore::default();
        let now = Utc::now();
        let payload = user_event(EVENT_USER_CREATED, "user_2abc", "seller@shop.example");
        let mut headers = signed_headers(&payload, now);
        headers.remove(HEADER_SIGNATURE);

        let err = handle_delivery(&store, &config(), &headers, &payload, now)
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisioningError::MissingHeaders));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(store.upserts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_secret_is_server_error() {
        let store = MemoryStore::default();
        let now = Utc::now();
        let payload = user_event(EVENT_USER_CREATED, "user_2abc", "seller@shop.example");
        let headers = signed_headers(&payload, now);

        let err = handle_delivery(&store, &IdentityConfig::default(), &headers, &payload, now)
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisioningError::MisconfiguredSecret));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_bad_signature_stops_processing() {
        let store = MemoryStore::default();
        let now = Utc::now();
        let payload = user_event(EVENT_USER_CREATED, "user_2abc", "seller@shop.example");
        let headers = signed_headers(&payload, now);
        let forged = user_event(EVENT_USER_CREATED, "user_2abc", "attacker@evil.example");

        let err = handle_delivery(&store, &config(), &headers, &forged, now)
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisioningError::InvalidSignature(_)));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(store.upserts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unhandled_event_is_acknowledged() {
        let store = MemoryStore::default();
        let now = Utc::now();
        let payload = br#"{"type":"session.created","data":{"id":"sess_1"}}"#;
        let headers = signed_headers(payload, now);

        let outcome = handle_delivery(&store, &config(), &headers, payload, now)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ProvisioningOutcome::Ignored {
                event_type: "session.created".to_string()
            }
        );
        assert_eq!(store.upserts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_email_is_malformed() {
        let store = MemoryStore::default();
        let now = Utc::now();
        let payload =
            br#"{"type":"user.created","data":{"id":"user_2abc","email_addresses":[]}}"#;
        let headers = signed_headers(payload, now);

        let err = handle_delivery(&store, &config(), &headers, payload, now)
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisioningError::MalformedPayload(_)));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(store.upserts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_update_changes_email_and_preserves_admin() {
        let store = MemoryStore::with_user("user_admin", "old@shop.example", UserRole::Admin);
        let now = Utc::now();
        let payload = user_event(EVENT_USER_UPDATED, "user_admin", "new@shop.example");
        let headers = signed_headers(&payload, now);

        handle_delivery(&store, &config(), &headers, &payload, now)
            .await
            .unwrap();

        let user = store.get("user_admin").unwrap();
        assert_eq!(user.email.as_str(), "new@shop.example");
        assert_eq!(user.role, UserRole::Admin);
    }

    #[tokio::test]
    async fn test_force_seller_policy_resets_role() {
        let store = MemoryStore::with_user("user_1", "one@shop.example", UserRole::Admin);
        let mut config = config();
        config.role_policy = RolePolicy::ForceSeller;
        let now = Utc::now();
        let payload = user_event(EVENT_USER_UPDATED, "user_1", "one@shop.example");
        let headers = signed_headers(&payload, now);

        handle_delivery(&store, &config, &headers, &payload, now)
            .await
            .unwrap();

        assert_eq!(store.get("user_1").unwrap().role, UserRole::Seller);
    }

    #[tokio::test]
    async fn test_persistence_failure_is_server_error() {
        let store = MemoryStore::default();
        *store.fail_with.lock().unwrap() =
            Some(|| RepositoryError::Database(sqlx::Error::PoolTimedOut));
        let now = Utc::now();
        let payload = user_event(EVENT_USER_CREATED, "user_2abc", "seller@shop.example");
        let headers = signed_headers(&payload, now);

        let err = handle_delivery(&store, &config(), &headers, &payload, now)
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisioningError::PersistenceError(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(store.upserts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_first_email_wins_over_named_primary() {
        let data: UserEventData = serde_json::from_value(serde_json::json!({
            "id": "user_1",
            "email_addresses": [
                {"id": "idn_a", "email_address": "first@shop.example"},
                {"id": "idn_b", "email_address": "primary@shop.example"}
            ],
            "primary_email_address_id": "idn_b"
        }))
        .unwrap();
        assert_eq!(data.primary_email(), Some("first@shop.example"));
    }

    #[test]
    fn test_first_of_several_emails_is_used() {
        let data: UserEventData = serde_json::from_value(serde_json::json!({
            "id": "user_1",
            "email_addresses": [
                {"id": "idn_a", "email_address": "first@shop.example"},
                {"id": "idn_b", "email_address": "second@shop.example"}
            ]
        }))
        .unwrap();
        assert_eq!(data.primary_email(), Some("first@shop.example"));
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let outcome = ProvisioningOutcome::Created {
            user_id: UserId::new(4),
            external_id: ExternalUserId::parse("user_1").unwrap(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "created");
        assert_eq!(json["user_id"], 4);
        assert_eq!(json["external_id"], "user_1");
    }
}
