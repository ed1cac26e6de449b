//! Plot rendering seam.
//!
//! Rendering itself is an external collaborator: implementations accept
//! interpreted result records and produce image files in the output
//! directory. The pipeline only depends on this trait.

use std::path::Path;

use argscan_core::result::AppResult;
use async_trait::async_trait;
use tracing::debug;

use crate::interpret::DetectionRecord;

/// Sink that renders result records into image files.
#[async_trait]
pub trait PlotSink: Send + Sync {
    /// Render plots for the given records into `output_dir`, returning the
    /// paths of the produced files.
    async fn render(&self, records: &[DetectionRecord], output_dir: &Path)
        -> AppResult<Vec<String>>;
}

/// A sink that renders nothing. Used when plotting is disabled or no
/// renderer is wired in.
#[derive(Debug, Clone, Default)]
pub struct NoopPlotSink;

#[async_trait]
impl PlotSink for NoopPlotSink {
    async fn render(
        &self,
        records: &[DetectionRecord],
        output_dir: &Path,
    ) -> AppResult<Vec<String>> {
        debug!(
            records = records.len(),
            dir = %output_dir.display(),
            "Plot rendering skipped (no renderer configured)"
        );
        Ok(Vec::new())
    }
}
