//! Retention sweeper: prunes terminal jobs and old log files.
//!
//! Runs inside the worker loop at a fixed interval. Each removal is
//! isolated; one undeletable directory never aborts the pass.

use std::path::Path;

use argscan_core::config::retention::RetentionConfig;
use argscan_core::result::AppResult;
use argscan_store::{Job, JobStatus, JobStore};
use chrono::{Duration, Utc};
use tracing::{debug, warn};

/// Outcome of one retention pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct SweepStats {
    /// Job directories removed.
    pub jobs_removed: usize,
    /// Log files removed.
    pub logs_removed: usize,
}

/// Apply retention policy to the job store and the logs directory.
///
/// QUEUED and RUNNING jobs are never touched. Cancelled jobs expire after
/// their audit window; completed and failed jobs expire by age first, then
/// by count (newest kept).
pub async fn sweep(
    store: &JobStore,
    logs_dir: &Path,
    retention: &RetentionConfig,
) -> AppResult<SweepStats> {
    let mut stats = SweepStats::default();
    let now = Utc::now();
    let jobs = store.list().await?;

    let cancelled_cutoff = now - Duration::hours(retention.cancelled_retention_hours as i64);
    let age_cutoff = now - Duration::days(retention.max_age_days as i64);

    let mut terminal: Vec<&Job> = Vec::new();
    for job in &jobs {
        match job.status {
            JobStatus::Cancelled => {
                // Audit window counts from creation, not from the cancel.
                if job.created_at < cancelled_cutoff {
                    stats.jobs_removed += remove(store, &job.id).await;
                }
            }
            JobStatus::Completed | JobStatus::Failed => {
                // Age is measured from creation; a late retry or note
                // append must not extend a job's lifetime.
                if job.created_at < age_cutoff {
                    stats.jobs_removed += remove(store, &job.id).await;
                } else {
                    terminal.push(job);
                }
            }
            JobStatus::Queued | JobStatus::Running => {}
        }
    }

    // list() is newest first, so everything past max_jobs is the oldest.
    for job in terminal.iter().skip(retention.max_jobs) {
        stats.jobs_removed += remove(store, &job.id).await;
    }

    stats.logs_removed = prune_logs(logs_dir, retention.log_retention_days).await;

    debug!(
        jobs_removed = stats.jobs_removed,
        logs_removed = stats.logs_removed,
        "Retention pass finished"
    );
    Ok(stats)
}

async fn remove(store: &JobStore, job_id: &str) -> usize {
    match store.delete(job_id).await {
        Ok(()) => 1,
        Err(e) => {
            warn!(job_id, error = %e, "Failed to remove expired job");
            0
        }
    }
}

/// Delete log files whose modification time is older than the retention
/// window. A missing logs directory is not an error.
async fn prune_logs(logs_dir: &Path, retention_days: u64) -> usize {
    let mut removed = 0;
    let mut entries = match tokio::fs::read_dir(logs_dir).await {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %logs_dir.display(), error = %e, "Cannot read logs directory");
            }
            return 0;
        }
    };

    let max_age = std::time::Duration::from_secs(retention_days * 24 * 60 * 60);
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let expired = match entry.metadata().await.and_then(|m| m.modified()) {
            Ok(modified) => modified.elapsed().map(|age| age > max_age).unwrap_or(false),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot stat log file");
                continue;
            }
        };
        if expired {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove log file"),
            }
        }
    }
    removed
}
