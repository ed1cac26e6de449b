//! Worker health endpoint configuration.

use serde::{Deserialize, Serialize};

/// Bind settings for the worker health HTTP endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8001
}
