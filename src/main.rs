//! ARGscan Server: antibiotic resistance gene detection service
//!
//! Main entry point that wires all crates together and starts the HTTP
//! server, optionally with an in-process worker.

use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::{fmt, EnvFilter};

use argscan_core::config::AppConfig;
use argscan_core::error::AppError;
use argscan_store::JobStore;
use argscan_worker::{DetectionPipeline, WorkerRunner};

#[tokio::main]
async fn main() {
    let env = std::env::var("ARGSCAN_ENV").unwrap_or_else(|_| "development".to_string());
    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt().pretty().with_env_filter(filter).with_target(true).init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting ARGscan v{}", env!("CARGO_PKG_VERSION"));

    create_data_directories(&config).await?;

    let store = JobStore::open(config.store.jobs_root()).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // In-process worker; deployments with a supervised worker process set
    // worker.enabled = false here.
    let worker_handle = if config.worker.enabled {
        tracing::info!("Starting in-process worker...");
        let pipeline = Arc::new(DetectionPipeline::new(config.pipeline.clone()));
        let runner = WorkerRunner::new(store.clone(), pipeline, &config);
        let worker_cancel = shutdown_rx.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = runner.run(worker_cancel).await {
                tracing::error!("Worker error: {e}");
            }
        });
        Some(handle)
    } else {
        tracing::info!("In-process worker disabled");
        None
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = argscan_api::AppState::new(config, store);
    let app = argscan_api::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;

    tracing::info!("ARGscan server listening on {addr}");

    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, starting graceful shutdown...");
        let _ = shutdown_tx.send(true);
    });

    server
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")))?;

    if let Some(handle) = worker_handle {
        tracing::info!("Waiting for worker to finish...");
        let _ = tokio::time::timeout(std::time::Duration::from_secs(30), handle).await;
    }

    tracing::info!("ARGscan server shut down gracefully");
    Ok(())
}

/// Create required data directories
async fn create_data_directories(config: &AppConfig) -> Result<(), AppError> {
    let dirs = [config.store.jobs_root(), config.store.logs_dir()];
    for dir in &dirs {
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            AppError::internal(format!("Failed to create dir '{}': {e}", dir.display()))
        })?;
    }
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
