//! Viewer store.
//!
//! Holds the gate's view of each signed-in user (`{user, profile?}`) so
//! page loads don't re-query on every request, and broadcasts a change
//! whenever a snapshot is replaced or dropped. Snapshots are cached for
//! 5 minutes; provisioning, onboarding and logout invalidate eagerly.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, instrument, warn};

use sellerdesk_core::ExternalUserId;
use sellerdesk_core::gate::{GateInputs, QueryErrorKind};

use crate::db::UserStore;
use crate::models::CurrentUserProfile;

const CACHE_TTL: Duration = Duration::from_secs(300);
const CACHE_CAPACITY: u64 = 10_000;
const CHANGE_FEED_CAPACITY: usize = 256;

/// Result of the "who am I" query for one viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewerSnapshot {
    /// The provisioned user, if the server knows them.
    pub user: Option<CurrentUserProfile>,
    /// Why `user` is absent.
    pub error: Option<QueryErrorKind>,
}

impl ViewerSnapshot {
    /// A provisioned user.
    #[must_use]
    pub const fn found(user: CurrentUserProfile) -> Self {
        Self {
            user: Some(user),
            error: None,
        }
    }

    /// The external id has no user row yet.
    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            user: None,
            error: Some(QueryErrorKind::AuthenticationRequired),
        }
    }

    /// The query failed for another reason.
    #[must_use]
    pub const fn failed() -> Self {
        Self {
            user: None,
            error: Some(QueryErrorKind::Other),
        }
    }

    /// Whether the viewer has completed onboarding.
    #[must_use]
    pub fn profile_present(&self) -> bool {
        self.user.as_ref().is_some_and(CurrentUserProfile::has_profile)
    }

    /// Gate inputs for a signed-in viewer on `route`.
    #[must_use]
    pub fn gate_inputs(&self, route: &str) -> GateInputs {
        GateInputs::resolved(route, self.profile_present(), self.error)
    }
}

/// Cached viewer snapshots plus a change feed.
#[derive(Clone)]
pub struct ViewerStore {
    inner: Arc<ViewerStoreInner>,
}

struct ViewerStoreInner {
    cache: Cache<ExternalUserId, ViewerSnapshot>,
    changes: broadcast::Sender<ExternalUserId>,
}

impl Default for ViewerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewerStore {
    /// Create an empty store with the default TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(CACHE_TTL)
    }

    /// Create an empty store whose snapshots expire after `ttl`.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(ttl)
            .build();
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);

        Self {
            inner: Arc::new(ViewerStoreInner { cache, changes }),
        }
    }

    /// The cached snapshot, if any.
    pub async fn get(&self, external_id: &ExternalUserId) -> Option<ViewerSnapshot> {
        self.inner.cache.get(external_id).await
    }

    /// The cached snapshot, or a fresh one read through `store`.
    ///
    /// Only definitive answers are cached; a failed query yields
    /// [`ViewerSnapshot::failed`] and is retried on the next call.
    #[instrument(skip(self, store), fields(external_id = %external_id))]
    pub async fn load<S>(&self, store: &S, external_id: &ExternalUserId) -> ViewerSnapshot
    where
        S: UserStore + ?Sized,
    {
        if let Some(snapshot) = self.get(external_id).await {
            debug!("Viewer cache hit");
            return snapshot;
        }

        let snapshot = match store.current_user_profile(external_id).await {
            Ok(Some(user)) => ViewerSnapshot::found(user),
            Ok(None) => ViewerSnapshot::unknown(),
            Err(err) => {
                warn!(error = %err, "Viewer query failed");
                return ViewerSnapshot::failed();
            }
        };

        self.inner
            .cache
            .insert(external_id.clone(), snapshot.clone())
            .await;
        snapshot
    }

    /// Replace the snapshot and notify subscribers.
    pub async fn update(&self, external_id: ExternalUserId, snapshot: ViewerSnapshot) {
        self.inner
            .cache
            .insert(external_id.clone(), snapshot)
            .await;
        self.notify(external_id);
    }

    /// Drop the snapshot and notify subscribers.
    pub async fn invalidate(&self, external_id: &ExternalUserId) {
        self.inner.cache.invalidate(external_id).await;
        self.notify(external_id.clone());
    }

    /// Receive the external id of every viewer whose snapshot changes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ExternalUserId> {
        self.inner.changes.subscribe()
    }

    fn notify(&self, external_id: ExternalUserId) {
        // No receivers is not an error
        let _ = self.inner.changes.send(external_id);
    }
}
