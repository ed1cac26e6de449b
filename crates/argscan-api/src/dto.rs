//! Request and response DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use argscan_store::{Job, ProgressEntry};

/// Standard success response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Public view of a job record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResponse {
    pub id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub attempts: u32,
    pub message: String,
    pub input_files: Vec<String>,
    pub output_files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub progress_history: Vec<ProgressEntry>,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            status: job.status.to_string(),
            created_at: job.created_at,
            updated_at: job.updated_at,
            attempts: job.attempts,
            message: job.message,
            input_files: job.input_files,
            output_files: job.output_files,
            last_error: job.last_error,
            progress_history: job.progress_history,
        }
    }
}

/// Compact job view for listings; progress history omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub attempts: u32,
    pub message: String,
}

impl From<Job> for JobSummary {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            status: job.status.to_string(),
            created_at: job.created_at,
            updated_at: job.updated_at,
            attempts: job.attempts,
            message: job.message,
        }
    }
}

/// Health document returned when the worker heartbeat cannot be read.
/// Mirrors the heartbeat shape with every field unknown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnknownHealth {
    pub ts: Option<DateTime<Utc>>,
    pub pid: Option<u32>,
    pub uptime: Option<f64>,
    pub status: String,
    pub last_job_id: Option<String>,
}

impl Default for UnknownHealth {
    fn default() -> Self {
        Self {
            ts: None,
            pid: None,
            uptime: None,
            status: "unknown".to_string(),
            last_job_id: None,
        }
    }
}
