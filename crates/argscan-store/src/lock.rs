//! Per-job lock markers, the claim primitive of the queue.
//!
//! A `.lock` file inside the job directory marks the job as claimed by the
//! current worker iteration. Creation uses `create_new`, so the check and
//! create are a single atomic step on one host. This is deliberately a
//! single-owner design: the supervisor ensures at most one worker process
//! runs at a time, so no distributed lease or fencing token is needed.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Name of the lock marker file inside a job directory.
const LOCK_FILE: &str = ".lock";

/// Exclusive processing claim over one job.
///
/// The marker is removed on [`release`](Self::release) or, as a last
/// resort, when the guard is dropped, so a panicking worker iteration
/// still frees the job for the next pass.
#[derive(Debug)]
pub struct JobLock {
    path: PathBuf,
    released: bool,
}

impl JobLock {
    /// Try to create the lock marker. Returns `None` when the marker
    /// already exists or cannot be created; the caller skips the job
    /// without blocking.
    pub(crate) async fn acquire(job_dir: &Path) -> Option<JobLock> {
        let path = job_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await;
        match file {
            Ok(mut f) => {
                // Content is informational only; ownership comes from create_new.
                let _ = f.write_all(Utc::now().to_rfc3339().as_bytes()).await;
                Some(JobLock {
                    path,
                    released: false,
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not create lock marker");
                None
            }
        }
    }

    /// Remove a marker left behind by an unclean worker shutdown so the
    /// job becomes claimable again.
    pub(crate) async fn clear_stale(job_dir: &Path) {
        let path = job_dir.join(LOCK_FILE);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to clear stale lock marker");
            }
        }
    }

    /// Remove the lock marker. Best-effort; a missing marker is not an error.
    pub async fn release(mut self) {
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Failed to remove lock marker");
            }
        }
        self.released = true;
    }
}

impl Drop for JobLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn acquire_is_exclusive() {
        let tmp = TempDir::new().unwrap();
        let first = JobLock::acquire(tmp.path()).await;
        assert!(first.is_some());
        assert!(JobLock::acquire(tmp.path()).await.is_none());
    }

    #[tokio::test]
    async fn drop_removes_marker() {
        let tmp = TempDir::new().unwrap();
        {
            let _lock = JobLock::acquire(tmp.path()).await.unwrap();
            assert!(tmp.path().join(LOCK_FILE).exists());
        }
        assert!(!tmp.path().join(LOCK_FILE).exists());
        assert!(JobLock::acquire(tmp.path()).await.is_some());
    }
}
