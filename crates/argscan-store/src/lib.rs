//! Durable, file-backed job persistence for ARGscan.
//!
//! This crate provides:
//! - The [`job::Job`] record and its [`job::JobStatus`] state machine
//! - The [`store::JobStore`] with atomic create/load/save/list semantics
//! - Per-job [`lock::JobLock`] markers used as the claim primitive
//! - [`heartbeat::Heartbeat`] snapshot read/write used for liveness checks
//!
//! One directory per job holds `job.json`, the `input/` and `output/`
//! directories, and a transient `.lock` marker. Writes go through a
//! temp-file-then-rename replace so a reader never observes a partially
//! written record.

mod atomic;
pub mod heartbeat;
pub mod job;
pub mod lock;
pub mod store;

pub use heartbeat::Heartbeat;
pub use job::{Job, JobStatus, ProgressEntry};
pub use lock::JobLock;
pub use store::JobStore;
