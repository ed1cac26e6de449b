//! Resistance gene detection pipeline for ARGscan.
//!
//! This crate provides:
//! - A FASTA validation oracle ([`fasta`])
//! - External aligner invocation with a deterministic mock fallback ([`align`])
//! - Best-hit selection and batch processing ([`detect`])
//! - Gene-to-antibiotic-class interpretation and CSV reports ([`interpret`])
//! - The pipeline entry point with stage progress notifications ([`runner`])
//!
//! The aligner itself is an external collaborator invoked as a subprocess;
//! plot rendering is likewise external and consumed through the
//! [`plot::PlotSink`] seam.

pub mod align;
pub mod detect;
pub mod fasta;
pub mod interpret;
pub mod plot;
pub mod runner;

pub use align::Hit;
pub use interpret::DetectionRecord;
pub use plot::{NoopPlotSink, PlotSink};
pub use runner::{run_pipeline, NoopProgress, PipelineParams, ProgressSink};
