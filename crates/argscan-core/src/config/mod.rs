//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod health;
pub mod logging;
pub mod pipeline;
pub mod retention;
pub mod server;
pub mod supervisor;
pub mod worker;

use serde::{Deserialize, Serialize};

use self::health::HealthConfig;
use self::logging::LoggingConfig;
use self::pipeline::PipelineConfig;
use self::retention::RetentionConfig;
use self::server::ServerConfig;
use self::supervisor::SupervisorConfig;
use self::worker::WorkerConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay) and
/// `ARGSCAN__`-prefixed environment variables.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Job store settings.
    #[serde(default)]
    pub store: StoreConfig,
    /// Polling worker settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Job/log retention settings.
    #[serde(default)]
    pub retention: RetentionConfig,
    /// Worker supervisor settings.
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    /// Worker health endpoint settings.
    #[serde(default)]
    pub health: HealthConfig,
    /// Detection pipeline defaults.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// File-backed job store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory for all runtime data (jobs, logs, heartbeat).
    #[serde(default = "default_data_root")]
    pub data_root: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
        }
    }
}

impl StoreConfig {
    /// Directory that holds one sub-directory per job.
    pub fn jobs_root(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.data_root).join("jobs")
    }

    /// Directory that holds worker and server log files.
    pub fn logs_dir(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.data_root).join("logs")
    }

    /// Well-known path of the worker heartbeat snapshot.
    pub fn heartbeat_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.data_root).join("worker.heartbeat.json")
    }

    /// Well-known path of the worker pid marker.
    pub fn pid_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.data_root).join("worker.pid")
    }
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `ARGSCAN__`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("ARGSCAN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}

fn default_data_root() -> String {
    "data".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.worker.poll_interval_seconds, 2);
        assert_eq!(config.worker.max_attempts, 2);
        assert_eq!(config.worker.cleanup_interval_seconds, 300);
        assert_eq!(config.retention.max_jobs, 50);
        assert_eq!(config.retention.max_age_days, 7);
        assert_eq!(config.retention.cancelled_retention_hours, 48);
        assert_eq!(config.retention.log_retention_days, 7);
        assert_eq!(config.supervisor.check_interval_seconds, 5);
        assert_eq!(config.supervisor.stale_after_seconds, 30);
        assert_eq!(config.health.port, 8001);
    }

    #[test]
    fn store_paths_derive_from_data_root() {
        let store = StoreConfig {
            data_root: "/tmp/argscan".to_string(),
        };
        assert_eq!(store.jobs_root(), std::path::PathBuf::from("/tmp/argscan/jobs"));
        assert_eq!(
            store.heartbeat_path(),
            std::path::PathBuf::from("/tmp/argscan/worker.heartbeat.json")
        );
    }
}
