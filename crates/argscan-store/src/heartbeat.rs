//! Worker liveness snapshot, overwritten each poll cycle.

use std::path::Path;

use argscan_core::result::AppResult;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::atomic::write_atomic;

/// Liveness snapshot published by the worker after every loop iteration.
///
/// Its absence, unparseability, or staleness signals that the worker is
/// unhealthy; the supervisor and health endpoint both read this document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heartbeat {
    /// When the snapshot was written.
    pub ts: DateTime<Utc>,
    /// Worker process id.
    pub pid: u32,
    /// Seconds since the worker process started.
    pub uptime: f64,
    /// Worker loop status, `"RUNNING"` while the loop is alive.
    pub status: String,
    /// Id of the most recently touched job, if any.
    pub last_job_id: Option<String>,
    /// Attempt count of the most recently touched job.
    pub last_job_attempts: u32,
    /// Most recent job failure detail, if any.
    pub last_error: Option<String>,
}

/// Atomically overwrite the heartbeat snapshot.
pub async fn write(path: &Path, heartbeat: &Heartbeat) -> AppResult<()> {
    let bytes = serde_json::to_vec(heartbeat)?;
    write_atomic(path, &bytes).await
}

/// Read the heartbeat snapshot. Returns `None` when the file is missing or
/// unparseable; both mean "worker unhealthy" to the caller.
pub async fn read(path: &Path) -> Option<Heartbeat> {
    let bytes = tokio::fs::read(path).await.ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(hb) => Some(hb),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Unparseable heartbeat snapshot");
            None
        }
    }
}

/// Delete the heartbeat snapshot. Best-effort, used on clean shutdown.
pub async fn remove(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove heartbeat file");
        }
    }
}

/// Decide whether a heartbeat indicates an unhealthy worker.
///
/// A missing or unparseable heartbeat is always stale; otherwise the
/// snapshot is stale once its timestamp is older than `stale_after`.
pub fn is_stale(heartbeat: Option<&Heartbeat>, now: DateTime<Utc>, stale_after: Duration) -> bool {
    match heartbeat {
        Some(hb) => now - hb.ts > stale_after,
        None => true,
    }
}
