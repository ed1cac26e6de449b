//! Gene detection: best-hit selection and batch processing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use argscan_core::result::AppResult;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::align::{run_alignment, Hit};
use crate::fasta::validate_fasta;
use crate::interpret::safe_fail;

/// File extensions recognized as FASTA inputs.
const FASTA_EXTENSIONS: [&str; 4] = ["fasta", "fa", "fna", "fas"];

/// Maximum target sequences requested from the aligner per query.
const MAX_TARGETS: u32 = 10;

/// Detect resistance genes in a single input FASTA.
///
/// Validates the input and database, runs the similarity search, and keeps
/// the best hit per gene. Input-file problems propagate; database problems
/// and downstream failures are safe-failed when `fail_silently` is set:
/// a minimal error report is written and the sample yields no hits.
pub async fn detect_genes(
    input_fasta: &Path,
    db_fasta: &Path,
    identity: f64,
    coverage: u64,
    sample_id: Option<&str>,
    output_dir: &Path,
    fail_silently: bool,
) -> AppResult<Vec<Hit>> {
    let sample = sample_id
        .map(str::to_string)
        .unwrap_or_else(|| sample_name(input_fasta));

    validate_fasta(input_fasta).await?;

    // A missing or corrupted database is a per-sample recoverable problem:
    // write the safe-fail report instead of raising.
    if let Err(db_err) = validate_fasta(db_fasta).await {
        let report = output_dir.join(format!("{sample}_results.csv"));
        safe_fail(&db_err.to_string(), &report).await;
        return Ok(Vec::new());
    }

    let result = async {
        let hits = run_alignment(
            input_fasta,
            db_fasta,
            identity,
            coverage,
            MAX_TARGETS,
            output_dir,
        )
        .await?;
        if hits.is_empty() {
            return Err(argscan_core::error::AppError::pipeline(
                "No resistance genes detected.",
            ));
        }
        Ok(hits)
    }
    .await;

    let hits = match result {
        Ok(hits) => hits,
        Err(e) if fail_silently => {
            let report = output_dir.join(format!("{sample}_results.csv"));
            safe_fail(&e.to_string(), &report).await;
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    let mut selected = best_hits(hits);
    for hit in &mut selected {
        hit.sample_id = Some(sample.clone());
    }
    info!(sample = %sample, genes = selected.len(), "Detected resistance genes");
    Ok(selected)
}

/// Keep only the highest-identity hit per gene.
pub fn best_hits(hits: Vec<Hit>) -> Vec<Hit> {
    let mut best: BTreeMap<String, Hit> = BTreeMap::new();
    for hit in hits {
        match best.get(&hit.gene) {
            Some(existing) if existing.identity >= hit.identity => {}
            _ => {
                best.insert(hit.gene.clone(), hit);
            }
        }
    }
    best.into_values().collect()
}

/// Process every FASTA file under `input_dir` and return hits per sample.
///
/// Files are discovered recursively; per-sample failures are isolated (the
/// sample yields no hits and a safe-fail report). When `threads > 1`
/// samples are processed concurrently under a bounded permit count.
pub async fn batch_detect_genes(
    input_dir: &Path,
    db_fasta: &Path,
    identity: f64,
    coverage: u64,
    threads: usize,
    output_dir: &Path,
) -> AppResult<BTreeMap<String, Vec<Hit>>> {
    let fasta_files = find_fasta_files(input_dir).await?;
    info!(
        count = fasta_files.len(),
        dir = %input_dir.display(),
        "Batch processing FASTA files"
    );

    let semaphore = Arc::new(Semaphore::new(threads.max(1)));
    let mut handles = Vec::with_capacity(fasta_files.len());

    for fasta in fasta_files {
        let semaphore = Arc::clone(&semaphore);
        let db = db_fasta.to_path_buf();
        let outdir = output_dir.to_path_buf();
        let input_root = input_dir.to_path_buf();

        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
            let sample = sample_name(&fasta);
            let mut hits = match detect_genes(
                &fasta,
                &db,
                identity,
                coverage,
                Some(&sample),
                &outdir,
                true,
            )
            .await
            {
                Ok(hits) => hits,
                Err(e) => {
                    warn!(file = %fasta.display(), error = %e, "Skipping file");
                    Vec::new()
                }
            };
            let relative = fasta
                .strip_prefix(&input_root)
                .unwrap_or(&fasta)
                .display()
                .to_string();
            for hit in &mut hits {
                hit.source_file = Some(relative.clone());
            }
            (sample, hits)
        }));
    }

    let mut results = BTreeMap::new();
    for handle in handles {
        let (sample, hits) = handle
            .await
            .map_err(|e| argscan_core::error::AppError::internal(format!("Sample task panicked: {e}")))?;
        results.insert(sample, hits);
    }
    Ok(results)
}

/// Sample identifier for an input file: the file stem.
pub fn sample_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Recursively collect FASTA files under a directory, sorted for
/// deterministic processing order within one batch.
async fn find_fasta_files(root: &Path) -> AppResult<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| {
            argscan_core::error::AppError::with_source(
                argscan_core::error::ErrorKind::Storage,
                format!("Failed to read input directory: {}", dir.display()),
                e,
            )
        })?;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| FASTA_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
            {
                found.push(path);
            }
        }
    }

    found.sort();
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn hit(gene: &str, identity: f64) -> Hit {
        Hit {
            query: "q".to_string(),
            gene: gene.to_string(),
            identity,
            length: 100,
            qstart: 1,
            qend: 100,
            sstart: 1,
            send: 100,
            sample_id: None,
            source_file: None,
        }
    }

    #[test]
    fn best_hits_keeps_highest_identity_per_gene() {
        let hits = vec![
            hit("blaTEM-1", 91.0),
            hit("blaTEM-1", 99.0),
            hit("tetA", 95.0),
            hit("blaTEM-1", 93.0),
        ];
        let best = best_hits(hits);
        assert_eq!(best.len(), 2);
        let bla = best.iter().find(|h| h.gene == "blaTEM-1").unwrap();
        assert_eq!(bla.identity, 99.0);
        assert!(best.iter().any(|h| h.gene == "tetA"));
    }

    #[tokio::test]
    async fn find_fasta_files_recurses_and_filters() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("nested");
        tokio::fs::create_dir_all(&nested).await.unwrap();
        for name in ["a.fasta", "b.fa", "notes.txt"] {
            tokio::fs::write(tmp.path().join(name), ">r\nACGT\n").await.unwrap();
        }
        tokio::fs::write(nested.join("c.fna"), ">r\nACGT\n").await.unwrap();

        let files = find_fasta_files(tmp.path()).await.unwrap();
        let names: Vec<String> = files.iter().map(|p| sample_name(p)).collect();
        assert_eq!(files.len(), 3);
        assert!(names.contains(&"a".to_string()));
        assert!(names.contains(&"b".to_string()));
        assert!(names.contains(&"c".to_string()));
    }

    #[tokio::test]
    async fn missing_db_safe_fails_with_report() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("sample1.fasta");
        tokio::fs::write(&input, ">r\nACGT\n").await.unwrap();
        let outdir = tmp.path().join("out");
        tokio::fs::create_dir_all(&outdir).await.unwrap();

        let hits = detect_genes(
            &input,
            &tmp.path().join("no_db.fasta"),
            90.0,
            80,
            None,
            &outdir,
            true,
        )
        .await
        .unwrap();

        assert!(hits.is_empty());
        let report = tokio::fs::read_to_string(outdir.join("sample1_results.csv"))
            .await
            .unwrap();
        assert!(report.starts_with("error\n"));
    }

    #[tokio::test]
    async fn invalid_input_propagates_even_when_silent() {
        let tmp = TempDir::new().unwrap();
        let outdir = tmp.path().join("out");
        tokio::fs::create_dir_all(&outdir).await.unwrap();

        let err = detect_genes(
            &tmp.path().join("absent.fasta"),
            &tmp.path().join("db.fasta"),
            90.0,
            80,
            None,
            &outdir,
            true,
        )
        .await
        .unwrap_err();
        assert!(err.is_not_found());
    }
}
