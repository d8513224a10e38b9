//! Application state shared across handlers.

use std::sync::Arc;

use dronify_core::{DronifyConfig, RecordStore};
use tokio::sync::RwLock;

/// Handle to the application state held by every handler.
pub type SharedState = Arc<RwLock<AppState>>;

/// Shared application state.
///
/// Writes take the write lock for the duration of one store transaction.
#[derive(Debug)]
pub struct AppState {
    /// Loaded configuration.
    pub config: DronifyConfig,

    /// Record store.
    pub store: RecordStore,
}

impl AppState {
    /// Create application state with an empty store built from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be initialized.
    pub fn new(config: DronifyConfig) -> anyhow::Result<Self> {
        let store = RecordStore::from_config(&config)?;
        Ok(Self { config, store })
    }

    /// Create application state around an existing store.
    #[must_use]
    pub const fn with_store(config: DronifyConfig, store: RecordStore) -> Self {
        Self { config, store }
    }

    /// Wrap the state for sharing between handlers.
    #[must_use]
    pub fn shared(self) -> SharedState {
        Arc::new(RwLock::new(self))
    }
}
