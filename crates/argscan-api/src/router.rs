//! Route definitions for the ARGscan HTTP API.
//!
//! Job routes are mounted under `/api`; the health endpoint lives at the
//! root so probes need no prefix. The router receives `AppState` and
//! passes it to all handlers via Axum's `State` extractor.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let max_upload = state.config.server.max_upload_mb as usize * 1024 * 1024;

    let api_routes = Router::new()
        .route("/jobs", post(handlers::jobs::create_job))
        .route("/jobs", get(handlers::jobs::list_jobs))
        .route("/jobs/{id}", get(handlers::jobs::get_job))
        .route("/jobs/{id}/cancel", post(handlers::jobs::cancel_job));

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(handlers::health::health))
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use argscan_core::config::AppConfig;
    use argscan_store::JobStore;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn app(tmp: &TempDir) -> (Router, AppState) {
        let mut config = AppConfig::default();
        config.store.data_root = tmp.path().display().to_string();
        let store = JobStore::open(config.store.jobs_root()).await.unwrap();
        let state = AppState::new(config, store);
        (build_router(state.clone()), state)
    }

    fn multipart_submission(boundary: &str) -> String {
        format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"files\"; filename=\"sample1.fasta\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\
             >contig1\nACGTACGT\n\r\n\
             --{boundary}\r\n\
             Content-Disposition: form-data; name=\"params\"\r\n\r\n\
             {{\"identity\": 95.0}}\r\n\
             --{boundary}--\r\n"
        )
    }

    #[tokio::test]
    async fn submit_upload_creates_queued_job_with_stored_input() {
        let tmp = TempDir::new().unwrap();
        let (app, state) = app(&tmp).await;

        let boundary = "X-ARGSCAN-TEST";
        let request = Request::builder()
            .method("POST")
            .uri("/api/jobs")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(multipart_submission(boundary)))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let jobs = state.store.list().await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].input_files, vec!["sample1.fasta".to_string()]);
        assert_eq!(jobs[0].params["identity"], serde_json::json!(95.0));
        let stored = state.store.input_dir(&jobs[0].id).join("sample1.fasta");
        assert!(stored.exists());
    }

    #[tokio::test]
    async fn submission_without_files_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let (app, _state) = app(&tmp).await;

        let boundary = "X-ARGSCAN-TEST";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"params\"\r\n\r\n\
             {{}}\r\n\
             --{boundary}--\r\n"
        );
        let request = Request::builder()
            .method("POST")
            .uri("/api/jobs")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_endpoint_returns_ok() {
        let tmp = TempDir::new().unwrap();
        let (app, state) = app(&tmp).await;
        state
            .store
            .create(Vec::new(), serde_json::Value::Null)
            .await
            .unwrap();

        let request = Request::builder()
            .uri("/api/jobs")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_without_heartbeat_is_unavailable() {
        let tmp = TempDir::new().unwrap();
        let (app, _state) = app(&tmp).await;
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
