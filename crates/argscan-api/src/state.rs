//! Shared application state threaded through all handlers.

use std::path::PathBuf;
use std::sync::Arc;

use argscan_core::config::AppConfig;
use argscan_store::JobStore;

/// State available to every handler via Axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// File-backed job store.
    pub store: Arc<JobStore>,
    /// Location of the worker heartbeat snapshot.
    pub heartbeat_path: PathBuf,
}

impl AppState {
    pub fn new(config: AppConfig, store: JobStore) -> Self {
        let heartbeat_path = config.store.heartbeat_path();
        Self {
            config: Arc::new(config),
            store: Arc::new(store),
            heartbeat_path,
        }
    }
}
