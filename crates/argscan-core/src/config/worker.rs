//! Polling worker configuration.

use serde::{Deserialize, Serialize};

/// Job queue worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the in-process worker is enabled on the server binary.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Interval in seconds between job store polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Total execution attempts allowed per job before it becomes FAILED.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Interval in seconds between retention sweeps.
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_seconds: default_poll_interval(),
            max_attempts: default_max_attempts(),
            cleanup_interval_seconds: default_cleanup_interval(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    2
}

fn default_max_attempts() -> u32 {
    2
}

fn default_cleanup_interval() -> u64 {
    300
}
