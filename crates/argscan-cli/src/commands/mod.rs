//! CLI command definitions and dispatch.

pub mod jobs;
pub mod run;

use clap::{Parser, Subcommand};

use argscan_core::config::AppConfig;
use argscan_core::error::AppError;

use crate::output::OutputFormat;

/// ARGscan: antibiotic resistance gene detection
#[derive(Debug, Parser)]
#[command(name = "argscan", version, about, long_about = None)]
pub struct Cli {
    /// Configuration environment (selects config/<env>.toml overlay)
    #[arg(short, long, default_value = "development")]
    pub env: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the detection pipeline directly on local files
    Run(run::RunArgs),
    /// Inspect and manage queued jobs
    Jobs(jobs::JobsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        match &self.command {
            Commands::Run(args) => run::execute(args).await,
            Commands::Jobs(args) => jobs::execute(args, &self.env, self.format).await,
        }
    }
}

/// Helper: load configuration for the selected environment
pub(crate) fn load_config(env: &str) -> Result<AppConfig, AppError> {
    AppConfig::load(env)
}
