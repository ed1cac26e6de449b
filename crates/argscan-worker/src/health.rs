//! Minimal worker-side health listener.
//!
//! Serves the heartbeat snapshot on its own port so probes work even when
//! the main API server is down. 200 with the snapshot when readable, 503
//! with an "unknown" document otherwise.

use std::path::PathBuf;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};

use argscan_core::config::health::HealthConfig;
use argscan_core::error::{AppError, ErrorKind};
use argscan_core::result::AppResult;
use argscan_store::heartbeat;
use tracing::info;

async fn health(State(heartbeat_path): State<PathBuf>) -> Response {
    match heartbeat::read(&heartbeat_path).await {
        Some(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "ts": null,
                "pid": null,
                "uptime": null,
                "status": "unknown",
                "last_job_id": null,
            })),
        )
            .into_response(),
    }
}

/// Router exposing `GET /health` backed by the heartbeat file.
pub fn router(heartbeat_path: PathBuf) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(heartbeat_path)
}

/// Bind and serve the health listener until the process exits.
pub async fn serve(config: &HealthConfig, heartbeat_path: PathBuf) -> AppResult<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Internal,
            format!("Failed to bind health listener on {addr}"),
            e,
        )
    })?;
    info!("Worker health listener on {addr}");
    axum::serve(listener, router(heartbeat_path))
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Internal, "Health listener error", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use argscan_store::heartbeat::Heartbeat;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::Utc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    #[tokio::test]
    async fn missing_snapshot_is_unavailable() {
        let tmp = TempDir::new().unwrap();
        let app = router(tmp.path().join("worker.heartbeat.json"));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn readable_snapshot_is_ok() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("worker.heartbeat.json");
        let snapshot = Heartbeat {
            ts: Utc::now(),
            pid: 1,
            uptime: 0.5,
            status: "RUNNING".to_string(),
            last_job_id: None,
            last_job_attempts: 0,
            last_error: None,
        };
        heartbeat::write(&path, &snapshot).await.unwrap();

        let app = router(path);
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
