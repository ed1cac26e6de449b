//! Job and log retention configuration.

use serde::{Deserialize, Serialize};

/// Retention limits applied by the cleanup sweeper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Maximum number of terminal (COMPLETED/FAILED) jobs kept, newest first.
    #[serde(default = "default_max_jobs")]
    pub max_jobs: usize,
    /// Age ceiling in days for terminal jobs, regardless of count.
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u64,
    /// How long cancelled jobs are retained for audit, in hours.
    #[serde(default = "default_cancelled_retention_hours")]
    pub cancelled_retention_hours: u64,
    /// Age ceiling in days for log files.
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_jobs: default_max_jobs(),
            max_age_days: default_max_age_days(),
            cancelled_retention_hours: default_cancelled_retention_hours(),
            log_retention_days: default_log_retention_days(),
        }
    }
}

fn default_max_jobs() -> usize {
    50
}

fn default_max_age_days() -> u64 {
    7
}

fn default_cancelled_retention_hours() -> u64 {
    48
}

fn default_log_retention_days() -> u64 {
    7
}
