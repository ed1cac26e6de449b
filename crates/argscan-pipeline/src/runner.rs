//! Pipeline entry point.
//!
//! Orchestrates validation, detection, interpretation, reporting, and the
//! optional plot sink, emitting free-text stage messages to a progress
//! sink along the way. Callers (worker, CLI) treat this as one opaque
//! operation that either returns interpreted records or fails.

use std::path::PathBuf;

use argscan_core::error::AppError;
use argscan_core::result::AppResult;
use async_trait::async_trait;
use tracing::warn;

use crate::detect::{batch_detect_genes, detect_genes, sample_name};
use crate::interpret::{interpret_hits, read_gene_class_map, write_report, DetectionRecord};
use crate::plot::PlotSink;

/// Parameters of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineParams {
    /// Input FASTA file or directory of FASTA files.
    pub input: PathBuf,
    /// Resistance gene database FASTA.
    pub db: PathBuf,
    /// Gene-to-class CSV mapping.
    pub map: PathBuf,
    /// Directory for CSV reports and plots.
    pub outdir: PathBuf,
    /// File name of the combined CSV report.
    pub output_name: String,
    /// Minimum percent identity for accepted hits.
    pub identity: f64,
    /// Minimum alignment coverage in base pairs.
    pub coverage: u64,
    /// Worker threads for batch processing.
    pub threads: usize,
    /// Whether to invoke the plot sink.
    pub plot: bool,
    /// Summary mode: print only, skip saving per-sample CSVs.
    pub summary: bool,
}

/// Receiver of free-text stage messages emitted during a run.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Record one stage message.
    async fn notify(&self, message: &str);
}

/// A progress sink that discards all messages.
#[derive(Debug, Clone, Default)]
pub struct NoopProgress;

#[async_trait]
impl ProgressSink for NoopProgress {
    async fn notify(&self, _message: &str) {}
}

/// Execute the detection pipeline and return the combined interpreted
/// results (may be empty).
pub async fn run_pipeline(
    params: &PipelineParams,
    progress: &dyn ProgressSink,
    plots: &dyn PlotSink,
) -> AppResult<Vec<DetectionRecord>> {
    progress.notify("Loading input sequences").await;

    if !params.input.exists() {
        return Err(AppError::not_found(format!(
            "Input path not found: {}",
            params.input.display()
        )));
    }

    progress.notify("Preparing database").await;
    ensure_writable_outdir(params).await?;

    let gene_class = read_gene_class_map(&params.map).await?;

    progress.notify("Running alignment").await;
    let combined = if params.input.is_dir() {
        let batch = batch_detect_genes(
            &params.input,
            &params.db,
            params.identity,
            params.coverage,
            params.threads,
            &params.outdir,
        )
        .await?;

        progress.notify("Filtering hits").await;
        let mut combined = Vec::new();
        for (sample, hits) in batch {
            let records = interpret_hits(&hits, &gene_class);
            if !params.summary {
                let per_sample = params.outdir.join(format!("{sample}_results.csv"));
                write_report(&records, &per_sample).await?;
            }
            combined.extend(records);
        }
        combined
    } else {
        let sample = sample_name(&params.input);
        let hits = detect_genes(
            &params.input,
            &params.db,
            params.identity,
            params.coverage,
            Some(sample.as_str()),
            &params.outdir,
            true,
        )
        .await?;

        progress.notify("Filtering hits").await;
        interpret_hits(&hits, &gene_class)
    };

    progress.notify("Building summary").await;
    if !params.summary {
        let combined_path = params.outdir.join(&params.output_name);
        write_report(&combined, &combined_path).await?;
    }

    if params.plot && !params.summary {
        progress.notify("Generating plots").await;
        // Plot failures never fail an otherwise-successful run.
        if let Err(e) = plots.render(&combined, &params.outdir).await {
            warn!(error = %e, "Plot rendering failed");
        }
    }

    progress.notify("Finalizing output").await;
    Ok(combined)
}

/// Ensure the output directory exists and is writable before any detection
/// work starts, so permission problems surface as submission-time errors.
async fn ensure_writable_outdir(params: &PipelineParams) -> AppResult<()> {
    tokio::fs::create_dir_all(&params.outdir).await.map_err(|e| {
        AppError::with_source(
            argscan_core::error::ErrorKind::Storage,
            format!("Cannot create output directory: {}", params.outdir.display()),
            e,
        )
    })?;
    let probe = params.outdir.join(".write_test");
    tokio::fs::write(&probe, b"ok").await.map_err(|e| {
        AppError::with_source(
            argscan_core::error::ErrorKind::Storage,
            format!(
                "Cannot write to output directory: {}",
                params.outdir.display()
            ),
            e,
        )
    })?;
    let _ = tokio::fs::remove_file(&probe).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plot::NoopPlotSink;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Progress sink that records every stage message.
    #[derive(Default)]
    struct RecordingProgress {
        messages: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ProgressSink for RecordingProgress {
        async fn notify(&self, message: &str) {
            self.messages.lock().unwrap().push(message.to_string());
        }
    }

    fn params(tmp: &TempDir) -> PipelineParams {
        PipelineParams {
            input: tmp.path().join("input"),
            db: tmp.path().join("db.fasta"),
            map: tmp.path().join("map.csv"),
            outdir: tmp.path().join("out"),
            output_name: "results.csv".to_string(),
            identity: 90.0,
            coverage: 2,
            threads: 1,
            plot: false,
            summary: false,
        }
    }

    async fn seed_inputs(tmp: &TempDir) {
        let input = tmp.path().join("input");
        tokio::fs::create_dir_all(&input).await.unwrap();
        tokio::fs::write(input.join("sample1.fasta"), ">contig1\nACGTACGT\n")
            .await
            .unwrap();
        tokio::fs::write(tmp.path().join("db.fasta"), ">blaTEM-1\nACGTAC\n>tetA\nGGTACC\n")
            .await
            .unwrap();
        tokio::fs::write(tmp.path().join("map.csv"), "gene,class\nblaTEM-1,Beta-lactam\n")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_input_fails_before_alignment() {
        let tmp = TempDir::new().unwrap();
        let err = run_pipeline(&params(&tmp), &NoopProgress, &NoopPlotSink)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn batch_run_writes_reports_and_notifies_stages() {
        // Relies on the mock-search fallback when no aligner is installed;
        // with a real aligner present the run still completes, so only
        // stage messages and report existence are asserted.
        let tmp = TempDir::new().unwrap();
        seed_inputs(&tmp).await;
        let params = params(&tmp);
        let progress = RecordingProgress::default();

        run_pipeline(&params, &progress, &NoopPlotSink).await.unwrap();

        let messages = progress.messages.lock().unwrap().clone();
        assert_eq!(messages.first().map(String::as_str), Some("Loading input sequences"));
        assert!(messages.iter().any(|m| m == "Running alignment"));
        assert_eq!(messages.last().map(String::as_str), Some("Finalizing output"));

        assert!(params.outdir.join("results.csv").exists());
    }

    #[tokio::test]
    async fn summary_mode_skips_csv_files() {
        let tmp = TempDir::new().unwrap();
        seed_inputs(&tmp).await;
        let mut params = params(&tmp);
        params.summary = true;

        run_pipeline(&params, &NoopProgress, &NoopPlotSink).await.unwrap();
        assert!(!params.outdir.join("results.csv").exists());
        assert!(!params.outdir.join("sample1_results.csv").exists());
    }
}
