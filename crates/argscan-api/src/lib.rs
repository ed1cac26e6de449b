//! # argscan-api
//!
//! HTTP API layer for ARGscan built on Axum.
//!
//! Exposes job submission (multipart upload), listing, inspection,
//! cooperative cancellation, and a worker health endpoint backed by the
//! heartbeat snapshot.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
