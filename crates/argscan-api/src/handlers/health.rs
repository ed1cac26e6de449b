//! Worker health handler backed by the heartbeat snapshot.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use argscan_store::heartbeat;

use crate::dto::UnknownHealth;
use crate::state::AppState;

/// GET /health
///
/// Returns the worker heartbeat document with 200 when it is present and
/// parseable, otherwise 503 with an "unknown" fallback document. Staleness
/// interpretation is left to the caller; the raw timestamp is included.
pub async fn health(State(state): State<AppState>) -> Response {
    match heartbeat::read(&state.heartbeat_path).await {
        Some(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, Json(UnknownHealth::default())).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argscan_core::config::AppConfig;
    use argscan_store::heartbeat::Heartbeat;
    use argscan_store::JobStore;
    use chrono::Utc;
    use tempfile::TempDir;

    async fn state(tmp: &TempDir) -> AppState {
        let mut config = AppConfig::default();
        config.store.data_root = tmp.path().display().to_string();
        let store = JobStore::open(config.store.jobs_root()).await.unwrap();
        AppState::new(config, store)
    }

    #[tokio::test]
    async fn missing_heartbeat_is_service_unavailable() {
        let tmp = TempDir::new().unwrap();
        let response = health(State(state(&tmp).await)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn present_heartbeat_is_ok() {
        let tmp = TempDir::new().unwrap();
        let state = state(&tmp).await;
        let snapshot = Heartbeat {
            ts: Utc::now(),
            pid: 7,
            uptime: 1.0,
            status: "RUNNING".to_string(),
            last_job_id: None,
            last_job_attempts: 0,
            last_error: None,
        };
        heartbeat::write(&state.heartbeat_path, &snapshot).await.unwrap();

        let response = health(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
