//! Publishes the worker heartbeat snapshot and pid marker.

use std::path::{Path, PathBuf};
use std::time::Instant;

use argscan_core::error::{AppError, ErrorKind};
use argscan_core::result::AppResult;
use argscan_store::heartbeat::{self, Heartbeat};
use argscan_store::Job;
use chrono::Utc;
use tracing::warn;

/// Accumulates last-job state and overwrites the heartbeat snapshot on
/// demand. Owned by the worker loop; one writer per worker process.
#[derive(Debug)]
pub struct HeartbeatWriter {
    heartbeat_path: PathBuf,
    pid_path: PathBuf,
    pid: u32,
    started: Instant,
    last_job_id: Option<String>,
    last_job_attempts: u32,
    last_error: Option<String>,
}

impl HeartbeatWriter {
    /// Create the writer and publish the pid marker.
    ///
    /// A pid file that cannot be written is a startup failure; the
    /// supervisor and operators rely on it to identify the live worker.
    pub async fn start(heartbeat_path: &Path, pid_path: &Path) -> AppResult<Self> {
        if let Some(parent) = heartbeat_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to create data directory: {}", parent.display()),
                    e,
                )
            })?;
        }
        let pid = std::process::id();
        tokio::fs::write(pid_path, pid.to_string()).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to write pid file: {}", pid_path.display()),
                e,
            )
        })?;
        Ok(Self {
            heartbeat_path: heartbeat_path.to_path_buf(),
            pid_path: pid_path.to_path_buf(),
            pid,
            started: Instant::now(),
            last_job_id: None,
            last_job_attempts: 0,
            last_error: None,
        })
    }

    /// Capture the outcome of the most recently processed job.
    pub fn record_outcome(&mut self, job: &Job) {
        self.last_job_id = Some(job.id.clone());
        self.last_job_attempts = job.attempts;
        self.last_error = job.last_error.clone();
    }

    /// Overwrite the heartbeat snapshot. A write failure is logged, not
    /// fatal; the loop must keep running and the next beat may succeed.
    pub async fn beat(&self) {
        let snapshot = Heartbeat {
            ts: Utc::now(),
            pid: self.pid,
            uptime: self.started.elapsed().as_secs_f64(),
            status: "RUNNING".to_string(),
            last_job_id: self.last_job_id.clone(),
            last_job_attempts: self.last_job_attempts,
            last_error: self.last_error.clone(),
        };
        if let Err(e) = heartbeat::write(&self.heartbeat_path, &snapshot).await {
            warn!(error = %e, "Failed to write heartbeat snapshot");
        }
    }

    /// Remove the heartbeat snapshot and pid marker on clean shutdown, so
    /// monitoring distinguishes "stopped" from "crashed".
    pub async fn shutdown(self) {
        heartbeat::remove(&self.heartbeat_path).await;
        if let Err(e) = tokio::fs::remove_file(&self.pid_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.pid_path.display(), error = %e, "Failed to remove pid file");
            }
        }
    }
}
