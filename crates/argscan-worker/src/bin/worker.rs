//! Standalone worker process. Polls the job store, executes detection
//! jobs, and publishes its heartbeat until interrupted.

use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::{fmt, EnvFilter};

use argscan_core::config::AppConfig;
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
        tracing::error!("Worker error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    match config.logging.format.as_str() {
        "json" => fmt().json().with_env_filter(filter).with_target(true).init(),
        _ => fmt().pretty().with_env_filter(filter).with_target(true).init(),
    }
}

async fn run(config: AppConfig) -> argscan_core::result::AppResult<()> {
    let store = JobStore::open(config.store.jobs_root()).await?;
    tokio::fs::create_dir_all(config.store.logs_dir()).await?;

    let pipeline = Arc::new(DetectionPipeline::new(config.pipeline.clone()));
    let runner = WorkerRunner::new(store, pipeline, &config);

    let health_config = config.health.clone();
    let heartbeat_path = config.store.heartbeat_path();
    tokio::spawn(async move {
        if let Err(e) = argscan_worker::health::serve(&health_config, heartbeat_path).await {
            tracing::error!("Health listener error: {e}");
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    runner.run(shutdown_rx).await
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
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
