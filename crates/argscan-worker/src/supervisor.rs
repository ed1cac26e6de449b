//! Worker watchdog: restarts the worker process when it dies or stalls.
//!
//! The supervisor owns the worker as a child process. Every check interval
//! it verifies two things: the process is still alive, and its heartbeat
//! snapshot is recent. A freshly spawned worker gets one stale window of
//! grace before its heartbeat is judged.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use argscan_core::error::{AppError, ErrorKind};
use argscan_core::result::AppResult;
use argscan_store::heartbeat;
use chrono::Utc;
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::time;
use tracing::{info, warn};

pub struct Supervisor {
    program: PathBuf,
    args: Vec<String>,
    heartbeat_path: PathBuf,
    check_interval: Duration,
    stale_after: chrono::Duration,
}

impl Supervisor {
    pub fn new(
        program: impl Into<PathBuf>,
        heartbeat_path: impl Into<PathBuf>,
        check_interval_seconds: u64,
        stale_after_seconds: u64,
    ) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            heartbeat_path: heartbeat_path.into(),
            check_interval: Duration::from_secs(check_interval_seconds),
            stale_after: chrono::Duration::seconds(stale_after_seconds as i64),
        }
    }

    /// Arguments passed to the worker process on every (re)spawn.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Supervise until the cancel signal flips to `true`. The worker child
    /// is killed on shutdown rather than orphaned.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) -> AppResult<()> {
        let mut child = self.spawn()?;
        let mut spawned_at = Instant::now();
        info!(program = %self.program.display(), "Supervisor started");

        loop {
            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        break;
                    }
                }
                _ = time::sleep(self.check_interval) => {}
            }

            match child.try_wait() {
                Ok(Some(status)) => {
                    warn!(%status, "Worker process exited, restarting");
                    child = self.spawn()?;
                    spawned_at = Instant::now();
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "Could not poll worker process status");
                }
            }

            if !grace_elapsed(spawned_at, self.stale_after) {
                continue;
            }
            let snapshot = heartbeat::read(&self.heartbeat_path).await;
            if heartbeat::is_stale(snapshot.as_ref(), Utc::now(), self.stale_after) {
                warn!("Worker heartbeat is stale, killing and restarting");
                terminate(&mut child).await;
                child = self.spawn()?;
                spawned_at = Instant::now();
            }
        }

        info!("Supervisor shutting down, stopping worker");
        terminate(&mut child).await;
        Ok(())
    }

    fn spawn(&self) -> AppResult<Child> {
        Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Internal,
                    format!("Failed to spawn worker: {}", self.program.display()),
                    e,
                )
            })
    }
}

/// Whether the post-spawn grace window has passed; heartbeat staleness is
/// meaningless before the worker had one stale window to publish.
fn grace_elapsed(spawned_at: Instant, stale_after: chrono::Duration) -> bool {
    spawned_at.elapsed() >= Duration::from_secs(stale_after.num_seconds().max(0) as u64)
}

async fn terminate(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        warn!(error = %e, "Failed to signal worker process");
    }
    let _ = child.wait().await;
}

/// Resolve the worker binary as a sibling of the current executable.
pub fn sibling_worker_binary(name: &str) -> AppResult<PathBuf> {
    let exe = std::env::current_exe().map_err(|e| {
        AppError::with_source(ErrorKind::Internal, "Cannot determine current executable", e)
    })?;
    let dir = exe.parent().unwrap_or_else(|| Path::new("."));
    Ok(dir.join(name))
}
