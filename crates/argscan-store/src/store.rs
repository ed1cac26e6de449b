//! Filesystem-backed job store with atomic read/write semantics.

use std::path::{Path, PathBuf};

use argscan_core::error::{AppError, ErrorKind};
use argscan_core::result::AppResult;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::atomic::write_atomic;
use crate::job::Job;
use crate::lock::JobLock;

/// Name of the metadata file inside each job directory.
const JOB_FILE: &str = "job.json";

/// Durable persistence of [`Job`] records keyed by id.
///
/// Each job owns a directory `<root>/<id>/` containing `job.json`, an
/// `input/` directory with uploaded sequence files, an `output/` directory
/// for artifacts, and a transient `.lock` marker while claimed.
///
/// The store performs no job execution; all components read-modify-write
/// through [`load`](Self::load)/[`save`](Self::save). Concurrent writers
/// follow last-writer-wins.
#[derive(Debug, Clone)]
pub struct JobStore {
    /// Directory holding one sub-directory per job.
    root: PathBuf,
}

impl JobStore {
    /// Open (and create if necessary) a store rooted at the given path.
    pub async fn open(root: impl Into<PathBuf>) -> AppResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create jobs root: {}", root.display()),
                e,
            )
        })?;
        Ok(Self { root })
    }

    /// The jobs root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory owned by the given job.
    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.root.join(job_id)
    }

    /// Directory holding the job's input sequence files.
    pub fn input_dir(&self, job_id: &str) -> PathBuf {
        self.job_dir(job_id).join("input")
    }

    /// Directory holding the job's produced artifacts.
    pub fn output_dir(&self, job_id: &str) -> PathBuf {
        self.job_dir(job_id).join("output")
    }

    /// Allocate a fresh id and persist an initial QUEUED record.
    ///
    /// A store error here is a job-submission failure surfaced to the
    /// caller; no worker is involved yet.
    pub async fn create(
        &self,
        input_files: Vec<String>,
        params: serde_json::Value,
    ) -> AppResult<Job> {
        let id = Uuid::new_v4().simple().to_string();
        let job = Job::new(id, input_files, params);

        let dir = self.job_dir(&job.id);
        fs::create_dir_all(dir.join("input")).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create job directory: {}", dir.display()),
                e,
            )
        })?;

        self.save(&job).await?;
        debug!(job_id = %job.id, "Created job");
        Ok(job)
    }

    /// Load a job record by id. Fails with `NotFound` if no record exists.
    pub async fn load(&self, job_id: &str) -> AppResult<Job> {
        let path = self.job_dir(job_id).join(JOB_FILE);
        let bytes = fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("Job not found: {job_id}"))
            } else {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to read job record: {}", path.display()),
                    e,
                )
            }
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            AppError::with_source(
                ErrorKind::Serialization,
                format!("Corrupt job record: {}", path.display()),
                e,
            )
        })
    }

    /// Atomically replace the job's persisted record.
    ///
    /// The record is written to a temporary location and renamed over the
    /// canonical `job.json`, so a crash mid-write never corrupts the stored
    /// record.
    pub async fn save(&self, job: &Job) -> AppResult<()> {
        let path = self.job_dir(&job.id).join(JOB_FILE);
        let bytes = serde_json::to_vec_pretty(job)?;
        write_atomic(&path, &bytes).await
    }

    /// List all job records, newest first by creation time.
    ///
    /// Unreadable or corrupt records are skipped, not fatal; the sweep and
    /// UI listings must not be blocked by one bad directory.
    pub async fn list(&self) -> AppResult<Vec<Job>> {
        let mut jobs = Vec::new();
        let mut entries = fs::read_dir(&self.root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to read jobs root: {}", self.root.display()),
                e,
            )
        })?;

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(id) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            match self.load(id).await {
                Ok(job) => jobs.push(job),
                Err(e) => {
                    debug!(job_id = id, error = %e, "Skipping unreadable job record");
                }
            }
        }

        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    /// Delete a job's directory and everything in it.
    pub async fn delete(&self, job_id: &str) -> AppResult<()> {
        let dir = self.job_dir(job_id);
        fs::remove_dir_all(&dir).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to delete job directory: {}", dir.display()),
                e,
            )
        })?;
        debug!(job_id, "Deleted job directory");
        Ok(())
    }

    /// Attempt to acquire the job's exclusive lock marker without blocking.
    ///
    /// Returns `None` when the marker already exists (another pass owns it)
    /// or cannot be created.
    pub async fn try_lock(&self, job_id: &str) -> Option<JobLock> {
        JobLock::acquire(&self.job_dir(job_id)).await
    }

    /// Remove a lock marker without holding the guard. Used during orphan
    /// recovery, where the previous owner died without releasing.
    pub async fn clear_lock(&self, job_id: &str) {
        JobLock::clear_stale(&self.job_dir(job_id)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStatus;
    use tempfile::TempDir;

    async fn store() -> (TempDir, JobStore) {
        let tmp = TempDir::new().unwrap();
        let store = JobStore::open(tmp.path().join("jobs")).await.unwrap();
        (tmp, store)
    }

    #[tokio::test]
    async fn create_then_load_roundtrip() {
        let (_tmp, store) = store().await;
        let params = serde_json::json!({"identity": 90.0, "coverage": 80});
        let job = store
            .create(vec!["sample1.fasta".into()], params.clone())
            .await
            .unwrap();

        let loaded = store.load(&job.id).await.unwrap();
        assert_eq!(loaded.id, job.id);
        assert_eq!(loaded.status, JobStatus::Queued);
        assert_eq!(loaded.attempts, 0);
        assert_eq!(loaded.params, params);
        assert_eq!(loaded.input_files, vec!["sample1.fasta".to_string()]);
        assert!(store.input_dir(&job.id).exists());
    }

    #[tokio::test]
    async fn load_missing_job_is_not_found() {
        let (_tmp, store) = store().await;
        let err = store.load("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn save_replaces_record_atomically() {
        let (_tmp, store) = store().await;
        let mut job = store.create(Vec::new(), serde_json::Value::Null).await.unwrap();

        job.status = JobStatus::Running;
        job.attempts = 1;
        job.touch();
        store.save(&job).await.unwrap();

        let loaded = store.load(&job.id).await.unwrap();
        assert_eq!(loaded.status, JobStatus::Running);
        assert_eq!(loaded.attempts, 1);
        // No temp file left behind after the rename.
        assert!(!store.job_dir(&job.id).join("job.tmp").exists());
    }

    #[tokio::test]
    async fn list_is_newest_first_and_skips_garbage() {
        let (_tmp, store) = store().await;
        let first = store.create(Vec::new(), serde_json::Value::Null).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = store.create(Vec::new(), serde_json::Value::Null).await.unwrap();

        // A directory without a job.json must not break listing.
        tokio::fs::create_dir_all(store.root().join("stray")).await.unwrap();

        let jobs = store.list().await.unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].id, second.id);
        assert_eq!(jobs[1].id, first.id);
    }

    #[tokio::test]
    async fn store_io_failures_report_the_storage_kind() {
        let (_tmp, store) = store().await;
        let err = store.delete("missing").await.unwrap_err();
        assert_eq!(err.kind, argscan_core::error::ErrorKind::Storage);
    }

    #[tokio::test]
    async fn lock_is_exclusive_until_released() {
        let (_tmp, store) = store().await;
        let job = store.create(Vec::new(), serde_json::Value::Null).await.unwrap();

        let lock = store.try_lock(&job.id).await;
        assert!(lock.is_some());
        assert!(store.try_lock(&job.id).await.is_none());

        lock.unwrap().release().await;
        assert!(store.try_lock(&job.id).await.is_some());
    }

    #[tokio::test]
    async fn concurrent_claims_have_exactly_one_winner() {
        let (_tmp, store) = store().await;
        let job = store.create(Vec::new(), serde_json::Value::Null).await.unwrap();

        let mut winners = 0;
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let id = job.id.clone();
            handles.push(tokio::spawn(async move { store.try_lock(&id).await }));
        }
        let mut held = Vec::new();
        for handle in handles {
            if let Some(lock) = handle.await.unwrap() {
                winners += 1;
                held.push(lock);
            }
        }
        assert_eq!(winners, 1);
    }
}
