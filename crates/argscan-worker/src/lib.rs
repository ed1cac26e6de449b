//! Background job processing for ARGscan.
//!
//! This crate provides:
//! - A worker runner that polls the job store and executes detection jobs
//! - A heartbeat writer publishing worker liveness after every loop cycle
//! - A retention sweeper that prunes terminal jobs and old log files
//! - A supervisor that restarts the worker process when it dies or stalls

pub mod health;
pub mod heartbeat;
pub mod runner;
pub mod supervisor;
pub mod sweeper;

pub use heartbeat::HeartbeatWriter;
pub use runner::{DetectionPipeline, JobPipeline, WorkerRunner};
pub use supervisor::Supervisor;
