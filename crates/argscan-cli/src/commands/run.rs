//! Direct pipeline invocation on local files, no queue involved.

use std::path::PathBuf;

use async_trait::async_trait;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use argscan_core::error::AppError;
use argscan_pipeline::{
    run_pipeline, DetectionRecord, NoopPlotSink, PipelineParams, ProgressSink,
};

use crate::output::print_success;

/// Arguments for the run command
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Input FASTA file or directory of FASTA files
    #[arg(short, long)]
    pub input: PathBuf,

    /// Resistance gene database FASTA
    #[arg(short, long)]
    pub db: PathBuf,

    /// Gene-to-class CSV mapping
    #[arg(short, long)]
    pub map: PathBuf,

    /// Output directory for reports
    #[arg(short, long, default_value = "results")]
    pub outdir: PathBuf,

    /// File name of the combined report
    #[arg(long, default_value = "results.csv")]
    pub output: String,

    /// Minimum percent identity
    #[arg(long, default_value_t = 90.0)]
    pub identity: f64,

    /// Minimum alignment coverage in base pairs
    #[arg(long, default_value_t = 80)]
    pub coverage: u64,

    /// Worker threads for batch processing
    #[arg(long, default_value_t = 1)]
    pub threads: usize,

    /// Print the summary table only, skip writing CSV reports
    #[arg(long)]
    pub summary: bool,

    /// Suppress progress messages
    #[arg(short, long)]
    pub quiet: bool,
}

/// Progress sink that echoes stage messages to stderr.
struct ConsoleProgress {
    quiet: bool,
}

#[async_trait]
impl ProgressSink for ConsoleProgress {
    async fn notify(&self, message: &str) {
        if !self.quiet {
            eprintln!("[argscan] {message}");
        }
    }
}

/// Detection row for table output
#[derive(Debug, Serialize, Tabled)]
struct RecordRow {
    /// Sample
    sample: String,
    /// Gene
    gene: String,
    /// Identity %
    identity: String,
    /// Coverage (bp)
    coverage: u64,
    /// Antibiotic class
    class: String,
}

/// Execute the run command
pub async fn execute(args: &RunArgs) -> Result<(), AppError> {
    let params = PipelineParams {
        input: args.input.clone(),
        db: args.db.clone(),
        map: args.map.clone(),
        outdir: args.outdir.clone(),
        output_name: args.output.clone(),
        identity: args.identity,
        coverage: args.coverage,
        threads: args.threads,
        plot: false,
        summary: args.summary,
    };

    let progress = ConsoleProgress { quiet: args.quiet };
    let records = run_pipeline(&params, &progress, &NoopPlotSink).await?;

    print_records(&records);

    if !args.summary {
        print_success(&format!(
            "Report written to {}",
            args.outdir.join(&args.output).display()
        ));
    }
    Ok(())
}

fn print_records(records: &[DetectionRecord]) {
    if records.is_empty() {
        println!("No resistance genes detected.");
        return;
    }
    let rows: Vec<RecordRow> = records
        .iter()
        .map(|r| RecordRow {
            sample: r.sample_id.clone(),
            gene: r.gene.clone(),
            identity: format!("{:.1}", r.identity),
            coverage: r.coverage,
            class: r.antibiotic_class.clone(),
        })
        .collect();
    println!("{}", tabled::Table::new(rows));
}
