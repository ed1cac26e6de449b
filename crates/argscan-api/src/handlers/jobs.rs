//! Job submission, listing, inspection, and cancellation handlers.

use std::path::Path as FsPath;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;

use argscan_core::error::{AppError, ErrorKind};
use argscan_store::JobStatus;

use crate::dto::{ApiResponse, JobResponse, JobSummary};
use crate::error::ApiError;
use crate::state::AppState;

/// POST /api/jobs
///
/// Multipart submission: one or more sequence file parts plus an optional
/// `params` part carrying a JSON object of pipeline overrides. The job is
/// persisted QUEUED; the worker picks it up on its next poll.
pub async fn create_job(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<JobResponse>>), ApiError> {
    let mut params = serde_json::Value::Null;
    let mut files: Vec<(String, Vec<u8>)> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("Multipart error: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        if let Some(file_name) = field.file_name().map(str::to_string) {
            let file_name = sanitize_filename(&file_name)?;
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::validation(format!("Failed to read upload: {e}")))?;
            if data.is_empty() {
                return Err(AppError::validation(format!("Uploaded file is empty: {file_name}")).into());
            }
            files.push((file_name, data.to_vec()));
        } else if name == "params" {
            let text = field
                .text()
                .await
                .map_err(|e| AppError::validation(format!("Failed to read params: {e}")))?;
            params = serde_json::from_str(&text)
                .map_err(|_| AppError::validation("params must be a valid JSON object"))?;
        }
    }

    if files.is_empty() {
        return Err(AppError::validation("At least one sequence file is required").into());
    }

    let names = files.iter().map(|(name, _)| name.clone()).collect();
    let job = state.store.create(names, params).await?;

    let input_dir = state.store.input_dir(&job.id);
    for (name, data) in files {
        tokio::fs::write(input_dir.join(&name), data).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to store upload: {name}"),
                e,
            )
        })?;
    }

    tracing::info!(job_id = %job.id, "Job submitted");
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(job.into()))))
}

/// GET /api/jobs
pub async fn list_jobs(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<JobSummary>>>, ApiError> {
    let jobs = state.store.list().await?;
    let summaries = jobs.into_iter().map(JobSummary::from).collect();
    Ok(Json(ApiResponse::ok(summaries)))
}

/// GET /api/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<JobResponse>>, ApiError> {
    let job = state.store.load(&id).await?;
    Ok(Json(ApiResponse::ok(job.into())))
}

/// POST /api/jobs/{id}/cancel
///
/// Cooperative cancellation: the record is marked CANCELLED so the worker
/// skips it on its next claim pass. A job already in a terminal state
/// cannot be cancelled.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<JobResponse>>, ApiError> {
    let mut job = state.store.load(&id).await?;
    if job.status.is_terminal() {
        return Err(AppError::conflict(format!(
            "Job {id} is already {} and cannot be cancelled",
            job.status
        ))
        .into());
    }
    job.status = JobStatus::Cancelled;
    job.message = "Cancelled by user".to_string();
    job.touch();
    state.store.save(&job).await?;
    tracing::info!(job_id = %id, "Job cancelled");
    Ok(Json(ApiResponse::ok(job.into())))
}

/// Strip any path components from an uploaded file name.
fn sanitize_filename(name: &str) -> Result<String, AppError> {
    let cleaned = FsPath::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        return Err(AppError::validation(format!("Invalid file name: {name}")));
    }
    Ok(cleaned.to_string())
}
