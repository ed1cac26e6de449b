//! Worker runner: the main loop that polls the job store and executes jobs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use argscan_core::config::AppConfig;
use argscan_core::config::pipeline::PipelineConfig;
use argscan_core::config::retention::RetentionConfig;
use argscan_core::config::worker::WorkerConfig;
use argscan_core::result::AppResult;
use argscan_pipeline::{run_pipeline, NoopPlotSink, PipelineParams, ProgressSink};
use argscan_store::{Job, JobStatus, JobStore};
use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tokio::time;
use tracing::{error, info, warn};

use crate::heartbeat::HeartbeatWriter;
use crate::sweeper;

/// Executes one claimed job. The seam exists so the runner's claim, retry,
/// and persistence logic is testable without invoking an aligner.
#[async_trait]
pub trait JobPipeline: Send + Sync {
    /// Run the detection pipeline for one job and return the names of the
    /// artifacts produced under `output_dir`.
    async fn execute(
        &self,
        job: &Job,
        input_dir: &Path,
        output_dir: &Path,
        progress: &dyn ProgressSink,
    ) -> AppResult<Vec<String>>;
}

/// The real pipeline: resolves parameters from the job record with config
/// defaults as fallback, then delegates to the detection pipeline.
#[derive(Debug, Clone)]
pub struct DetectionPipeline {
    defaults: PipelineConfig,
}

impl DetectionPipeline {
    pub fn new(defaults: PipelineConfig) -> Self {
        Self { defaults }
    }

    /// Merge caller-supplied job parameters over the configured defaults.
    /// Unknown or mistyped fields fall back silently; the submission
    /// surface validates shape, the worker only consumes it.
    fn resolve_params(&self, job: &Job, input_dir: &Path, output_dir: &Path) -> PipelineParams {
        let p = &job.params;
        let string_or = |key: &str, default: &str| {
            p.get(key)
                .and_then(|v| v.as_str())
                .unwrap_or(default)
                .to_string()
        };
        PipelineParams {
            input: input_dir.to_path_buf(),
            db: PathBuf::from(string_or("db", &self.defaults.db)),
            map: PathBuf::from(string_or("map", &self.defaults.map)),
            outdir: output_dir.to_path_buf(),
            output_name: string_or("output", "results.csv"),
            identity: p
                .get("identity")
                .and_then(|v| v.as_f64())
                .unwrap_or(self.defaults.identity),
            coverage: p
                .get("coverage")
                .and_then(|v| v.as_u64())
                .unwrap_or(self.defaults.coverage),
            threads: p
                .get("threads")
                .and_then(|v| v.as_u64())
                .map(|v| v as usize)
                .unwrap_or(self.defaults.threads),
            plot: p.get("plot").and_then(|v| v.as_bool()).unwrap_or(false),
            summary: false,
        }
    }
}

#[async_trait]
impl JobPipeline for DetectionPipeline {
    async fn execute(
        &self,
        job: &Job,
        input_dir: &Path,
        output_dir: &Path,
        progress: &dyn ProgressSink,
    ) -> AppResult<Vec<String>> {
        let params = self.resolve_params(job, input_dir, output_dir);
        run_pipeline(&params, progress, &NoopPlotSink).await?;
        Ok(list_artifacts(output_dir).await)
    }
}

/// Names of regular files under the output directory, sorted. An unreadable
/// directory yields an empty list; the run itself already succeeded.
async fn list_artifacts(output_dir: &Path) -> Vec<String> {
    let mut names = Vec::new();
    match tokio::fs::read_dir(output_dir).await {
        Ok(mut entries) => {
            while let Ok(Some(entry)) = entries.next_entry().await {
                if entry.path().is_file() {
                    names.push(entry.file_name().to_string_lossy().to_string());
                }
            }
        }
        Err(e) => {
            warn!(path = %output_dir.display(), error = %e, "Could not list output artifacts");
        }
    }
    names.sort();
    names
}

/// Progress sink that persists each stage message into the job record.
struct StoreProgress {
    store: JobStore,
    job: Arc<Mutex<Job>>,
}

#[async_trait]
impl ProgressSink for StoreProgress {
    async fn notify(&self, message: &str) {
        let mut job = self.job.lock().await;
        job.push_progress(message);
        if let Err(e) = self.store.save(&job).await {
            warn!(job_id = %job.id, error = %e, "Failed to persist progress update");
        }
    }
}

/// Main worker: polls for QUEUED jobs, claims them through the lock marker,
/// runs the pipeline, and applies the retry policy. All errors are absorbed
/// inside the loop; only shutdown ends it.
pub struct WorkerRunner {
    store: JobStore,
    pipeline: Arc<dyn JobPipeline>,
    worker: WorkerConfig,
    retention: RetentionConfig,
    logs_dir: PathBuf,
    heartbeat_path: PathBuf,
    pid_path: PathBuf,
}

impl WorkerRunner {
    pub fn new(store: JobStore, pipeline: Arc<dyn JobPipeline>, config: &AppConfig) -> Self {
        Self {
            store,
            pipeline,
            worker: config.worker.clone(),
            retention: config.retention.clone(),
            logs_dir: config.store.logs_dir(),
            heartbeat_path: config.store.heartbeat_path(),
            pid_path: config.store.pid_path(),
        }
    }

    /// Run the worker loop until the cancel signal flips to `true`.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) -> AppResult<()> {
        let mut heartbeat = HeartbeatWriter::start(&self.heartbeat_path, &self.pid_path).await?;

        info!(
            poll_interval = self.worker.poll_interval_seconds,
            max_attempts = self.worker.max_attempts,
            "Worker started"
        );

        self.recover_orphans().await;

        let poll_interval = Duration::from_secs(self.worker.poll_interval_seconds);
        let sweep_interval = Duration::from_secs(self.worker.cleanup_interval_seconds);
        let mut last_sweep = Instant::now();

        loop {
            if *cancel.borrow() {
                break;
            }

            let did_work = self.process_next(&mut heartbeat).await;

            if last_sweep.elapsed() >= sweep_interval {
                match sweeper::sweep(&self.store, &self.logs_dir, &self.retention).await {
                    Ok(stats) => info!(
                        jobs_removed = stats.jobs_removed,
                        logs_removed = stats.logs_removed,
                        "Retention sweep complete"
                    ),
                    Err(e) => warn!(error = %e, "Retention sweep failed"),
                }
                last_sweep = Instant::now();
            }

            heartbeat.beat().await;

            if !did_work {
                tokio::select! {
                    changed = cancel.changed() => {
                        if changed.is_err() || *cancel.borrow() {
                            break;
                        }
                    }
                    _ = time::sleep(poll_interval) => {}
                }
            }
        }

        heartbeat.shutdown().await;
        info!("Worker shut down");
        Ok(())
    }

    /// Requeue jobs left RUNNING by an unclean shutdown. Their lock markers
    /// belong to a dead process and are cleared so the jobs can be claimed.
    async fn recover_orphans(&self) {
        let jobs = match self.store.list().await {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!(error = %e, "Orphan scan failed");
                return;
            }
        };
        for mut job in jobs {
            if job.status != JobStatus::Running {
                continue;
            }
            warn!(job_id = %job.id, "Requeueing job orphaned by unclean shutdown");
            job.status = JobStatus::Queued;
            job.add_note("requeued after unclean worker shutdown");
            if let Err(e) = self.store.save(&job).await {
                warn!(job_id = %job.id, error = %e, "Failed to requeue orphaned job");
                continue;
            }
            self.store.clear_lock(&job.id).await;
        }
    }

    /// Claim and execute at most one QUEUED job. Returns whether a job was
    /// processed, so the caller can skip the idle sleep.
    async fn process_next(&self, heartbeat: &mut HeartbeatWriter) -> bool {
        let jobs = match self.store.list().await {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!(error = %e, "Job store scan failed");
                return false;
            }
        };

        // Oldest first; list() returns newest first.
        for job in jobs.into_iter().rev() {
            if job.status != JobStatus::Queued {
                continue;
            }
            let Some(lock) = self.store.try_lock(&job.id).await else {
                continue;
            };
            // Reload under the lock; a cancel may have landed since listing.
            let current = match self.store.load(&job.id).await {
                Ok(current) => current,
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "Claimed job vanished");
                    lock.release().await;
                    continue;
                }
            };
            if current.status != JobStatus::Queued {
                lock.release().await;
                continue;
            }

            self.execute_claimed(current, heartbeat).await;
            lock.release().await;
            return true;
        }
        false
    }

    /// Run one claimed job through the pipeline and apply the retry policy.
    async fn execute_claimed(&self, mut job: Job, heartbeat: &mut HeartbeatWriter) {
        job.attempts += 1;
        job.status = JobStatus::Running;
        job.message = "Running detection pipeline".to_string();
        job.last_error = None;
        job.touch();
        if let Err(e) = self.store.save(&job).await {
            error!(job_id = %job.id, error = %e, "Failed to mark job RUNNING");
            return;
        }

        let job_id = job.id.clone();
        let attempt = job.attempts;
        info!(job_id = %job_id, attempt, max_attempts = self.worker.max_attempts, "Executing job");

        let input_dir = self.store.input_dir(&job_id);
        let output_dir = self.store.output_dir(&job_id);
        let shared = Arc::new(Mutex::new(job));
        let progress = StoreProgress {
            store: self.store.clone(),
            job: Arc::clone(&shared),
        };

        let snapshot = shared.lock().await.clone();
        let result = self
            .pipeline
            .execute(&snapshot, &input_dir, &output_dir, &progress)
            .await;

        let mut job = shared.lock().await.clone();
        match result {
            Ok(artifacts) => {
                job.status = JobStatus::Completed;
                job.output_files = artifacts;
                job.message = "Detection completed".to_string();
                job.last_error = None;
                info!(job_id = %job.id, attempt, "Job completed");
            }
            Err(e) => {
                let detail = e.detail();
                job.last_error = Some(detail.clone());
                if job.attempts < self.worker.max_attempts {
                    job.status = JobStatus::Queued;
                    job.message = format!("Attempt {attempt} failed, will retry");
                    job.add_note(&format!("attempt {attempt} failed: {detail}"));
                    warn!(job_id = %job.id, attempt, error = %detail, "Job failed, requeued for retry");
                } else {
                    job.status = JobStatus::Failed;
                    job.message = "Detection failed".to_string();
                    job.add_note(&format!("attempt {attempt} failed: {detail}"));
                    error!(job_id = %job.id, attempt, error = %detail, "Job failed permanently");
                }
            }
        }
        job.touch();
        if let Err(e) = self.store.save(&job).await {
            error!(job_id = %job.id, error = %e, "Failed to persist job outcome");
        }
        heartbeat.record_outcome(&job);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argscan_core::error::AppError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    /// Pipeline stub that fails a fixed number of times, then succeeds.
    struct FlakyPipeline {
        failures_left: AtomicU32,
    }

    impl FlakyPipeline {
        fn failing(times: u32) -> Arc<Self> {
            Arc::new(Self {
                failures_left: AtomicU32::new(times),
            })
        }
    }

    #[async_trait]
    impl JobPipeline for FlakyPipeline {
        async fn execute(
            &self,
            _job: &Job,
            _input_dir: &Path,
            _output_dir: &Path,
            progress: &dyn ProgressSink,
        ) -> AppResult<Vec<String>> {
            progress.notify("Running alignment").await;
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(AppError::pipeline("aligner crashed"));
            }
            Ok(vec!["results.csv".to_string()])
        }
    }

    struct Harness {
        _tmp: TempDir,
        store: JobStore,
        runner: WorkerRunner,
        heartbeat: HeartbeatWriter,
    }

    async fn harness(pipeline: Arc<dyn JobPipeline>) -> Harness {
        let tmp = TempDir::new().unwrap();
        let store = JobStore::open(tmp.path().join("jobs")).await.unwrap();
        let mut config = AppConfig::default();
        config.store.data_root = tmp.path().display().to_string();
        let heartbeat = HeartbeatWriter::start(
            &config.store.heartbeat_path(),
            &config.store.pid_path(),
        )
        .await
        .unwrap();
        let runner = WorkerRunner::new(store.clone(), pipeline, &config);
        Harness {
            _tmp: tmp,
            store,
            runner,
            heartbeat,
        }
    }

    #[tokio::test]
    async fn transient_failure_retries_then_completes() {
        let mut h = harness(FlakyPipeline::failing(1)).await;
        let job = h
            .store
            .create(vec!["s.fasta".into()], serde_json::Value::Null)
            .await
            .unwrap();

        // First pass fails and requeues.
        assert!(h.runner.process_next(&mut h.heartbeat).await);
        let after_first = h.store.load(&job.id).await.unwrap();
        assert_eq!(after_first.status, JobStatus::Queued);
        assert_eq!(after_first.attempts, 1);
        assert!(after_first.last_error.as_deref().unwrap().contains("aligner crashed"));

        // Second pass succeeds.
        assert!(h.runner.process_next(&mut h.heartbeat).await);
        let after_second = h.store.load(&job.id).await.unwrap();
        assert_eq!(after_second.status, JobStatus::Completed);
        assert_eq!(after_second.attempts, 2);
        assert!(after_second.last_error.is_none());
        assert_eq!(after_second.output_files, vec!["results.csv".to_string()]);
        assert!(!after_second.progress_history.is_empty());
    }

    #[tokio::test]
    async fn exhausted_attempts_fail_permanently() {
        let mut h = harness(FlakyPipeline::failing(10)).await;
        let job = h
            .store
            .create(Vec::new(), serde_json::Value::Null)
            .await
            .unwrap();

        assert!(h.runner.process_next(&mut h.heartbeat).await);
        assert!(h.runner.process_next(&mut h.heartbeat).await);

        let after = h.store.load(&job.id).await.unwrap();
        assert_eq!(after.status, JobStatus::Failed);
        assert_eq!(after.attempts, 2);
        assert!(after.last_error.is_some());
        assert!(after.worker_notes.contains("attempt 2 failed"));

        // Nothing left to claim.
        assert!(!h.runner.process_next(&mut h.heartbeat).await);
    }

    /// Pipeline stub that always fails with an underlying cause attached.
    struct SourcedFailure;

    #[async_trait]
    impl JobPipeline for SourcedFailure {
        async fn execute(
            &self,
            _job: &Job,
            _input_dir: &Path,
            _output_dir: &Path,
            _progress: &dyn ProgressSink,
        ) -> AppResult<Vec<String>> {
            let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "aligner stdout closed");
            Err(AppError::with_source(
                argscan_core::error::ErrorKind::ExternalTool,
                "alignment run failed",
                io,
            ))
        }
    }

    #[tokio::test]
    async fn captured_failure_detail_includes_underlying_cause() {
        let mut h = harness(Arc::new(SourcedFailure)).await;
        let job = h
            .store
            .create(Vec::new(), serde_json::Value::Null)
            .await
            .unwrap();

        assert!(h.runner.process_next(&mut h.heartbeat).await);
        let after = h.store.load(&job.id).await.unwrap();
        let detail = after.last_error.as_deref().unwrap();
        assert!(detail.contains("alignment run failed"));
        assert!(detail.contains("aligner stdout closed"));
        assert!(after.worker_notes.contains("aligner stdout closed"));
    }

    #[tokio::test]
    async fn cancelled_jobs_are_never_claimed() {
        let mut h = harness(FlakyPipeline::failing(0)).await;
        let mut job = h
            .store
            .create(Vec::new(), serde_json::Value::Null)
            .await
            .unwrap();
        job.status = JobStatus::Cancelled;
        h.store.save(&job).await.unwrap();

        assert!(!h.runner.process_next(&mut h.heartbeat).await);
        let after = h.store.load(&job.id).await.unwrap();
        assert_eq!(after.status, JobStatus::Cancelled);
        assert_eq!(after.attempts, 0);
    }

    #[tokio::test]
    async fn orphaned_running_jobs_are_requeued_on_startup() {
        let h = harness(FlakyPipeline::failing(0)).await;
        let mut job = h
            .store
            .create(Vec::new(), serde_json::Value::Null)
            .await
            .unwrap();
        job.status = JobStatus::Running;
        job.attempts = 1;
        h.store.save(&job).await.unwrap();
        // Simulate the dead worker's leftover claim.
        let stale = h.store.try_lock(&job.id).await.unwrap();
        std::mem::forget(stale);

        h.runner.recover_orphans().await;

        let after = h.store.load(&job.id).await.unwrap();
        assert_eq!(after.status, JobStatus::Queued);
        assert!(after.worker_notes.contains("unclean worker shutdown"));
        assert!(h.store.try_lock(&job.id).await.is_some());
    }

    #[tokio::test]
    async fn job_params_override_pipeline_defaults() {
        let pipeline = DetectionPipeline::new(PipelineConfig::default());
        let job = Job::new(
            "j1".into(),
            Vec::new(),
            serde_json::json!({"identity": 95.5, "coverage": 120, "db": "custom/db.fasta"}),
        );
        let params = pipeline.resolve_params(&job, Path::new("in"), Path::new("out"));
        assert_eq!(params.identity, 95.5);
        assert_eq!(params.coverage, 120);
        assert_eq!(params.db, PathBuf::from("custom/db.fasta"));
        // Omitted fields keep their configured defaults.
        assert_eq!(params.map, PathBuf::from("data/gene_class_map.csv"));
        assert_eq!(params.threads, 1);
        assert!(!params.plot);
    }
}
