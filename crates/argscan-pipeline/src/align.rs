//! External aligner invocation and tabular hit parsing.
//!
//! DIAMOND is preferred, then BLAST+ (`blastn`, `blastp`). When no tool is
//! installed a deterministic mock search stands in, so tests and demo runs
//! work without external binaries. Output uses the tabular format
//! `qseqid sseqid pident length qstart qend sstart send`.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use argscan_core::error::AppError;
use argscan_core::result::AppResult;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

use crate::fasta::parse_fasta;

/// Output columns requested from the aligner.
const OUTFMT_COLUMNS: &str = "qseqid sseqid pident length qstart qend sstart send";

/// Errors from aligner execution.
#[derive(Debug, Error)]
pub enum AlignError {
    /// The aligner exited with a non-zero code.
    #[error("{tool} failed with exit code {code}: {stderr}")]
    ProcessFailed {
        /// Tool name.
        tool: &'static str,
        /// Exit code (-1 when terminated by signal).
        code: i32,
        /// Truncated standard error output.
        stderr: String,
    },

    /// Database index creation failed.
    #[error("Failed to build {tool} database for {db}: {detail}")]
    DbBuildFailed {
        /// Tool name.
        tool: &'static str,
        /// Database FASTA path.
        db: String,
        /// Failure detail.
        detail: String,
    },

    /// IO error while invoking the aligner or reading its output.
    #[error("I/O error during alignment: {0}")]
    Io(#[from] std::io::Error),
}

impl From<AlignError> for AppError {
    fn from(e: AlignError) -> Self {
        AppError::with_source(argscan_core::error::ErrorKind::ExternalTool, e.to_string(), e)
    }
}

/// A normalized alignment hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hit {
    /// Query sequence identifier.
    pub query: String,
    /// Matched gene identifier (subject sequence id).
    pub gene: String,
    /// Percent identity of the alignment.
    pub identity: f64,
    /// Alignment length in base pairs.
    pub length: u64,
    /// Query start position.
    pub qstart: u64,
    /// Query end position.
    pub qend: u64,
    /// Subject start position.
    pub sstart: u64,
    /// Subject end position.
    pub send: u64,
    /// Sample identifier, filled in by the detection layer.
    #[serde(default)]
    pub sample_id: Option<String>,
    /// Source file, filled in by batch processing.
    #[serde(default)]
    pub source_file: Option<String>,
}

/// Similarity search tool available on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignTool {
    /// DIAMOND (`diamond blastx`), preferred.
    Diamond,
    /// BLAST+ nucleotide search.
    BlastN,
    /// BLAST+ protein search.
    BlastP,
}

impl AlignTool {
    /// Executable name of this tool.
    pub fn command(&self) -> &'static str {
        match self {
            Self::Diamond => "diamond",
            Self::BlastN => "blastn",
            Self::BlastP => "blastp",
        }
    }
}

/// Check whether an executable is available on the system PATH.
pub async fn is_tool_installed(name: &str) -> bool {
    let probe = if cfg!(target_os = "windows") {
        "where"
    } else {
        "which"
    };
    Command::new(probe)
        .arg(name)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Detect an available search tool, DIAMOND first, then BLAST+ programs.
pub async fn detect_search_tool() -> Option<AlignTool> {
    if is_tool_installed("diamond").await {
        Some(AlignTool::Diamond)
    } else if is_tool_installed("blastn").await {
        Some(AlignTool::BlastN)
    } else if is_tool_installed("blastp").await {
        Some(AlignTool::BlastP)
    } else {
        None
    }
}

/// Ensure the database index exists for the selected tool, building it with
/// `diamond makedb` / `makeblastdb` when missing.
async fn ensure_db(tool: AlignTool, db_fasta: &Path) -> Result<(), AlignError> {
    match tool {
        AlignTool::Diamond => {
            let dmnd = PathBuf::from(format!("{}.dmnd", db_fasta.display()));
            if dmnd.exists() {
                return Ok(());
            }
            info!(db = %db_fasta.display(), "DIAMOND database missing, running diamond makedb");
            run_db_build(
                "diamond",
                &[
                    "makedb".to_string(),
                    "--in".to_string(),
                    db_fasta.display().to_string(),
                    "-d".to_string(),
                    db_fasta.display().to_string(),
                ],
                db_fasta,
            )
            .await
        }
        AlignTool::BlastN | AlignTool::BlastP => {
            let exts: &[&str] = if tool == AlignTool::BlastN {
                &[".nin", ".nhr", ".nsq"]
            } else {
                &[".pin", ".phr", ".psq"]
            };
            let present = exts
                .iter()
                .all(|ext| PathBuf::from(format!("{}{}", db_fasta.display(), ext)).exists());
            if present {
                return Ok(());
            }
            let db_type = if tool == AlignTool::BlastN { "nucl" } else { "prot" };
            info!(db = %db_fasta.display(), "BLAST database missing, running makeblastdb");
            run_db_build(
                "makeblastdb",
                &[
                    "-in".to_string(),
                    db_fasta.display().to_string(),
                    "-dbtype".to_string(),
                    db_type.to_string(),
                ],
                db_fasta,
            )
            .await
        }
    }
}

async fn run_db_build(command: &'static str, args: &[String], db: &Path) -> Result<(), AlignError> {
    let output = Command::new(command)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AlignError::DbBuildFailed {
            tool: command,
            db: db.display().to_string(),
            detail: stderr.chars().take(2000).collect(),
        });
    }
    Ok(())
}

/// Run the preferred available aligner (or the mock search) and return
/// threshold-filtered hits.
pub async fn run_alignment(
    query_fasta: &Path,
    db_fasta: &Path,
    identity: f64,
    coverage: u64,
    max_targets: u32,
    out_dir: &Path,
) -> AppResult<Vec<Hit>> {
    let Some(tool) = detect_search_tool().await else {
        warn!("No aligner found on PATH, using mock search");
        return mock_search(db_fasta).await;
    };

    ensure_db(tool, db_fasta).await.map_err(AppError::from)?;

    tokio::fs::create_dir_all(out_dir).await.map_err(|e| {
        AppError::with_source(
            argscan_core::error::ErrorKind::Storage,
            format!("Failed to create alignment output dir: {}", out_dir.display()),
            e,
        )
    })?;
    let out_file = out_dir.join("alignment_hits.tsv");

    let mut cmd = Command::new(tool.command());
    match tool {
        AlignTool::Diamond => {
            cmd.args([
                "blastx",
                "-q",
                &query_fasta.display().to_string(),
                "-d",
                &db_fasta.display().to_string(),
                "-o",
                &out_file.display().to_string(),
                "--outfmt",
                &format!("6 {OUTFMT_COLUMNS}"),
                "--max-target-seqs",
                &max_targets.to_string(),
            ]);
        }
        AlignTool::BlastN | AlignTool::BlastP => {
            cmd.args([
                "-query",
                &query_fasta.display().to_string(),
                "-db",
                &db_fasta.display().to_string(),
                "-outfmt",
                &format!("6 {OUTFMT_COLUMNS}"),
                "-max_target_seqs",
                &max_targets.to_string(),
                "-out",
                &out_file.display().to_string(),
            ]);
        }
    }

    let output = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| AppError::from(AlignError::Io(e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AlignError::ProcessFailed {
            tool: tool.command(),
            code: output.status.code().unwrap_or(-1),
            stderr: stderr.chars().take(2000).collect(),
        }
        .into());
    }

    info!(tool = tool.command(), out = %out_file.display(), "Alignment completed");
    parse_hits_file(&out_file, identity, coverage).await
}

/// Parse a tabular outfmt-6 file, dropping rows below the identity or
/// coverage thresholds. A missing output file yields no hits.
pub async fn parse_hits_file(path: &Path, identity: f64, coverage: u64) -> AppResult<Vec<Hit>> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(AppError::with_source(
                argscan_core::error::ErrorKind::Storage,
                format!("Failed to read alignment output: {}", path.display()),
                e,
            ));
        }
    };
    Ok(parse_hits(&text, identity, coverage))
}

/// Parse tabular outfmt-6 content into filtered hits.
pub fn parse_hits(content: &str, identity: f64, coverage: u64) -> Vec<Hit> {
    let mut hits = Vec::new();
    for line in content.lines() {
        let parts: Vec<&str> = line.trim().split('\t').collect();
        if parts.len() < 8 {
            continue;
        }
        let (Ok(pident), Ok(length)) = (parts[2].parse::<f64>(), parts[3].parse::<u64>()) else {
            continue;
        };
        if pident < identity || length < coverage {
            continue;
        }
        let pos = |i: usize| parts[i].parse::<u64>().unwrap_or(0);
        hits.push(Hit {
            query: parts[0].to_string(),
            gene: parts[1].to_string(),
            identity: pident,
            length,
            qstart: pos(4),
            qend: pos(5),
            sstart: pos(6),
            send: pos(7),
            sample_id: None,
            source_file: None,
        });
    }
    hits
}

/// Deterministic fallback search used when no external tool is present.
///
/// Returns one full-length, 100%-identity hit per database record, which
/// keeps unit tests and demonstration runs working offline.
pub async fn mock_search(db_fasta: &Path) -> AppResult<Vec<Hit>> {
    let records = parse_fasta(db_fasta).await?;
    Ok(records
        .into_iter()
        .map(|record| {
            let len = record.sequence.len() as u64;
            Hit {
                query: "mock_query".to_string(),
                gene: record.id,
                identity: 100.0,
                length: len,
                qstart: 1,
                qend: len,
                sstart: 1,
                send: len,
                sample_id: None,
                source_file: None,
            }
        })
        .collect())
}
