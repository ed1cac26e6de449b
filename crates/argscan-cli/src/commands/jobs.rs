//! Job store administration commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use argscan_core::error::AppError;
use argscan_store::{Job, JobStatus, JobStore};

use crate::output::{self, OutputFormat};

/// Arguments for job commands
#[derive(Debug, Args)]
pub struct JobsArgs {
    /// Job subcommand
    #[command(subcommand)]
    pub command: JobsCommand,
}

/// Job subcommands
#[derive(Debug, Subcommand)]
pub enum JobsCommand {
    /// List all jobs, newest first
    List {
        /// Filter by status (QUEUED, RUNNING, COMPLETED, FAILED, CANCELLED)
        #[arg(short, long)]
        status: Option<String>,
    },
    /// Show one job record in full
    Show {
        /// Job id
        id: String,
    },
    /// Cancel a queued or running job
    Cancel {
        /// Job id
        id: String,
    },
}

/// Job display row for table output
#[derive(Debug, Serialize, Tabled)]
struct JobRow {
    /// Job ID
    id: String,
    /// Status
    status: String,
    /// Attempts
    attempts: u32,
    /// Created
    created_at: String,
    /// Message
    message: String,
}

impl From<&Job> for JobRow {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            status: job.status.to_string(),
            attempts: job.attempts,
            created_at: job.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            message: job.message.clone(),
        }
    }
}

/// Execute job commands
pub async fn execute(args: &JobsArgs, env: &str, format: OutputFormat) -> Result<(), AppError> {
    let config = super::load_config(env)?;
    let store = JobStore::open(config.store.jobs_root()).await?;

    match &args.command {
        JobsCommand::List { status } => {
            let mut jobs = store.list().await?;
            if let Some(filter) = status {
                let filter = filter.to_uppercase();
                jobs.retain(|j| j.status.as_str() == filter);
            }
            let rows: Vec<JobRow> = jobs.iter().map(JobRow::from).collect();
            output::print_list(&rows, format);
        }
        JobsCommand::Show { id } => {
            let job = store.load(id).await?;
            output::print_item(&job, format);
        }
        JobsCommand::Cancel { id } => {
            let mut job = store.load(id).await?;
            if job.status.is_terminal() {
                return Err(AppError::conflict(format!(
                    "Job {id} is already {} and cannot be cancelled",
                    job.status
                )));
            }
            job.status = JobStatus::Cancelled;
            job.message = "Cancelled by operator".to_string();
            job.touch();
            store.save(&job).await?;
            output::print_success(&format!("Job {id} cancelled"));
        }
    }
    Ok(())
}
