//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::db::Database;
use crate::services::ViewerStore;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the database and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    db: Database,
    viewers: ViewerStore,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Server configuration
    /// * `db` - Opened database handle
    #[must_use]
    pub fn new(config: ServerConfig, db: Database) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                db,
                viewers: ViewerStore::new(),
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the database handle.
    #[must_use]
    pub fn db(&self) -> &Database {
        &self.inner.db
    }

    /// Get a reference to the viewer store.
    #[must_use]
    pub fn viewers(&self) -> &ViewerStore {
        &self.inner.viewers
    }
}
