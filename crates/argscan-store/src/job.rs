//! Job record model and status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of progress entries retained per job. Older entries are
/// dropped, not archived.
pub const MAX_PROGRESS_ENTRIES: usize = 100;

/// Status of a detection job.
///
/// Legal transitions:
/// `Queued → Running → {Completed, Failed}`, `Running → Queued` (retry),
/// and `Queued/Running → Cancelled` (external, cooperative). Terminal
/// states never transition further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    /// Waiting to be claimed by the worker.
    Queued,
    /// Currently being processed by the worker.
    Running,
    /// Pipeline run finished successfully.
    Completed,
    /// Failed after exhausting all attempts.
    Failed,
    /// Cancelled externally; never claimed again.
    Cancelled,
}

impl JobStatus {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Check whether a transition to `next` is allowed by the state machine.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (Self::Queued, Self::Running) => true,
            (Self::Running, Self::Completed | Self::Failed | Self::Queued) => true,
            (Self::Queued | Self::Running, Self::Cancelled) => true,
            _ => false,
        }
    }

    /// Return the status as an uppercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of a job's bounded progress history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEntry {
    /// When the progress message was recorded.
    pub ts: DateTime<Utc>,
    /// Free-text stage message from the pipeline.
    pub progress: String,
}

/// A detection job record, persisted as `job.json` inside its job directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier, assigned at creation, immutable.
    pub id: String,
    /// Current job status.
    pub status: JobStatus,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When the job was last mutated.
    pub updated_at: DateTime<Utc>,
    /// Number of execution attempts so far.
    pub attempts: u32,
    /// Bounded progress history, newest last.
    #[serde(default)]
    pub progress_history: Vec<ProgressEntry>,
    /// Caller-supplied pipeline parameters, opaque to the queue.
    #[serde(default)]
    pub params: serde_json::Value,
    /// Original uploaded file names (metadata only).
    #[serde(default)]
    pub input_files: Vec<String>,
    /// References to produced artifacts.
    #[serde(default)]
    pub output_files: Vec<String>,
    /// Captured failure detail from the most recent failed attempt.
    #[serde(default)]
    pub last_error: Option<String>,
    /// Short human-readable status message.
    #[serde(default)]
    pub message: String,
    /// Free-form diagnostic notes appended by the worker.
    #[serde(default)]
    pub worker_notes: String,
}

impl Job {
    /// Build a fresh QUEUED record with zero attempts and empty histories.
    pub fn new(id: String, input_files: Vec<String>, params: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Queued,
            created_at: now,
            updated_at: now,
            attempts: 0,
            progress_history: Vec::new(),
            params,
            input_files,
            output_files: Vec::new(),
            last_error: None,
            message: String::new(),
            worker_notes: String::new(),
        }
    }

    /// Refresh `updated_at` to now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Append a progress message, truncating the history to the most recent
    /// [`MAX_PROGRESS_ENTRIES`] entries.
    pub fn push_progress(&mut self, message: impl Into<String>) {
        self.progress_history.push(ProgressEntry {
            ts: Utc::now(),
            progress: message.into(),
        });
        if self.progress_history.len() > MAX_PROGRESS_ENTRIES {
            let excess = self.progress_history.len() - MAX_PROGRESS_ENTRIES;
            self.progress_history.drain(..excess);
        }
        self.touch();
    }

    /// Append a line to the worker notes.
    pub fn add_note(&mut self, note: &str) {
        if !self.worker_notes.is_empty() {
            self.worker_notes.push('\n');
        }
        self.worker_notes.push_str(note);
        self.touch();
    }
}
