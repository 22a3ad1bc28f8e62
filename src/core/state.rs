// Application state (AppState)

use crate::core::config::Config;
use crate::metrics::collector::Metrics;
use crate::stores::profile_store::CylinderStore;
use crate::wal::wal::Wal;
use std::sync::Arc;

/// Shared application state
///
/// Passed explicitly to every handler and to the startup code instead of a
/// process-wide store.
#[derive(Clone)]
pub struct AppState {
    /// Canonical profile store, backed by the WAL
    pub store: Arc<CylinderStore>,

    /// Metrics collector for tracking statistics
    pub metrics: Arc<Metrics>,

    /// Write-Ahead Log for persistence
    pub wal: Arc<Wal>,

    /// Configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, wal: Wal) -> Self {
        let config = Arc::new(config);
        let wal = Arc::new(wal);
        let metrics = Arc::new(Metrics::new());
        let store = Arc::new(CylinderStore::new(Arc::clone(&wal), Arc::clone(&metrics)));

        Self {
            store,
            metrics,
            wal,
            config,
        }
    }
}
