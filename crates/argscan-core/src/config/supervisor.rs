//! Worker supervisor configuration.

use serde::{Deserialize, Serialize};

/// Watchdog settings for the external worker supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Interval in seconds between heartbeat checks.
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,
    /// Heartbeat age in seconds beyond which the worker is considered stale.
    #[serde(default = "default_stale_after")]
    pub stale_after_seconds: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            check_interval_seconds: default_check_interval(),
            stale_after_seconds: default_stale_after(),
        }
    }
}

fn default_check_interval() -> u64 {
    5
}

fn default_stale_after() -> u64 {
    30
}
