//! Worker supervisor process. Spawns the worker binary and restarts it
//! when the process dies or its heartbeat goes stale.

use tokio::sync::watch;
use tracing_subscriber::{fmt, EnvFilter};

use argscan_core::config::AppConfig;
use argscan_worker::supervisor::{sibling_worker_binary, Supervisor};

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

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    match config.logging.format.as_str() {
        "json" => fmt().json().with_env_filter(filter).with_target(true).init(),
        _ => fmt().pretty().with_env_filter(filter).with_target(true).init(),
    }

    if let Err(e) = run(config).await {
        tracing::error!("Supervisor error: {e}");
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> argscan_core::result::AppResult<()> {
    let worker_bin = sibling_worker_binary("argscan-worker")?;
    let supervisor = Supervisor::new(
        worker_bin,
        config.store.heartbeat_path(),
        config.supervisor.check_interval_seconds,
        config.supervisor.stale_after_seconds,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    supervisor.run(shutdown_rx).await
}
