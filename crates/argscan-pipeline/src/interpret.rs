//! Hit interpretation: gene-to-class mapping and CSV reports.

use std::collections::HashMap;
use std::path::Path;

use argscan_core::error::AppError;
use argscan_core::result::AppResult;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::align::Hit;

/// Class assigned to genes absent from the mapping.
const UNKNOWN_CLASS: &str = "Unknown";

/// Column order of the results CSV.
pub const REPORT_COLUMNS: [&str; 6] = [
    "sample_id",
    "gene",
    "identity",
    "coverage",
    "antibiotic_class",
    "source_file",
];

/// One interpreted detection result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionRecord {
    /// Sample the gene was detected in.
    pub sample_id: String,
    /// Detected gene identifier.
    pub gene: String,
    /// Percent identity of the best hit.
    pub identity: f64,
    /// Alignment coverage in base pairs.
    pub coverage: u64,
    /// Antibiotic class the gene confers resistance to.
    pub antibiotic_class: String,
    /// Relative path of the source input file, when known.
    pub source_file: String,
}

/// Read a gene-to-class mapping CSV with `gene` and `class` columns.
pub async fn read_gene_class_map(path: &Path) -> AppResult<HashMap<String, String>> {
    let text = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AppError::not_found(format!("Gene class map not found: {}", path.display()))
        } else {
            AppError::with_source(
                argscan_core::error::ErrorKind::Storage,
                format!("Failed to read gene class map: {}", path.display()),
                e,
            )
        }
    })?;

    let mut lines = text.lines();
    let header = lines
        .next()
        .ok_or_else(|| AppError::validation(format!("Empty gene class map: {}", path.display())))?;
    let columns: Vec<&str> = header.split(',').map(str::trim).collect();
    let gene_idx = columns.iter().position(|c| *c == "gene").ok_or_else(|| {
        AppError::validation(format!("Gene class map missing 'gene' column: {}", path.display()))
    })?;
    let class_idx = columns.iter().position(|c| *c == "class").ok_or_else(|| {
        AppError::validation(format!(
            "Gene class map missing 'class' column: {}",
            path.display()
        ))
    })?;

    let mut map = HashMap::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() <= gene_idx.max(class_idx) {
            continue;
        }
        map.insert(fields[gene_idx].to_string(), fields[class_idx].to_string());
    }
    Ok(map)
}

/// Annotate hit records with their antibiotic class.
///
/// Genes absent from the mapping are classified as `"Unknown"`.
pub fn interpret_hits(hits: &[Hit], gene_class: &HashMap<String, String>) -> Vec<DetectionRecord> {
    hits.iter()
        .map(|hit| DetectionRecord {
            sample_id: hit.sample_id.clone().unwrap_or_else(|| "sample".to_string()),
            gene: hit.gene.clone(),
            identity: hit.identity,
            coverage: hit.length,
            antibiotic_class: gene_class
                .get(&hit.gene)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_CLASS.to_string()),
            source_file: hit.source_file.clone().unwrap_or_default(),
        })
        .collect()
}

/// Write interpreted results to a CSV file. An empty result set still
/// produces the header line so downstream consumers see a well-formed file.
pub async fn write_report(records: &[DetectionRecord], output_path: &Path) -> AppResult<()> {
    if let Some(parent) = output_path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            AppError::with_source(
                argscan_core::error::ErrorKind::Storage,
                format!("Failed to create report directory: {}", parent.display()),
                e,
            )
        })?;
    }

    let mut csv = String::new();
    csv.push_str(&REPORT_COLUMNS.join(","));
    csv.push('\n');
    for record in records {
        csv.push_str(&format!(
            "{},{},{},{},{},{}\n",
            record.sample_id,
            record.gene,
            record.identity,
            record.coverage,
            record.antibiotic_class,
            record.source_file
        ));
    }

    tokio::fs::write(output_path, csv).await.map_err(|e| {
        AppError::with_source(
            argscan_core::error::ErrorKind::Storage,
            format!("Failed to write report: {}", output_path.display()),
            e,
        )
    })?;
    info!(path = %output_path.display(), records = records.len(), "Results written");
    Ok(())
}

/// Write a minimal error report for a sample that could not be processed
/// for a recoverable reason (e.g. a missing database). Best-effort.
pub async fn safe_fail(message: &str, output_path: &Path) {
    error!(path = %output_path.display(), "{message}");
    let body = format!("error\n{message}\n");
    if let Err(e) = tokio::fs::write(output_path, body).await {
        error!(path = %output_path.display(), error = %e, "Failed to write safe-fail report");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn hit(gene: &str, sample: &str) -> Hit {
        Hit {
            query: "q".to_string(),
            gene: gene.to_string(),
            identity: 98.5,
            length: 850,
            qstart: 1,
            qend: 850,
            sstart: 1,
            send: 850,
            sample_id: Some(sample.to_string()),
            source_file: Some(format!("{sample}.fasta")),
        }
    }

    #[tokio::test]
    async fn reads_gene_class_map_with_reordered_columns() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("map.csv");
        tokio::fs::write(&path, "class,gene\nBeta-lactam,blaTEM-1\nTetracycline,tetA\n\n")
            .await
            .unwrap();

        let map = read_gene_class_map(&path).await.unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["blaTEM-1"], "Beta-lactam");
        assert_eq!(map["tetA"], "Tetracycline");
    }

    #[tokio::test]
    async fn map_without_required_columns_is_invalid() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("map.csv");
        tokio::fs::write(&path, "id,category\nx,y\n").await.unwrap();
        let err = read_gene_class_map(&path).await.unwrap_err();
        assert_eq!(err.kind, argscan_core::error::ErrorKind::Validation);
    }

    #[test]
    fn unknown_genes_get_unknown_class() {
        let mut map = HashMap::new();
        map.insert("blaTEM-1".to_string(), "Beta-lactam".to_string());

        let records = interpret_hits(&[hit("blaTEM-1", "s1"), hit("mysteryGene", "s1")], &map);
        assert_eq!(records[0].antibiotic_class, "Beta-lactam");
        assert_eq!(records[1].antibiotic_class, "Unknown");
        assert_eq!(records[0].coverage, 850);
        assert_eq!(records[0].source_file, "s1.fasta");
    }

    #[tokio::test]
    async fn report_contains_header_and_rows() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("out").join("results.csv");
        let map = HashMap::new();
        let records = interpret_hits(&[hit("tetA", "s1")], &map);

        write_report(&records, &out).await.unwrap();

        let text = tokio::fs::read_to_string(&out).await.unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "sample_id,gene,identity,coverage,antibiotic_class,source_file"
        );
        assert_eq!(lines.next().unwrap(), "s1,tetA,98.5,850,Unknown,s1.fasta");
    }

    #[tokio::test]
    async fn empty_report_still_has_header() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("results.csv");
        write_report(&[], &out).await.unwrap();
        let text = tokio::fs::read_to_string(&out).await.unwrap();
        assert_eq!(text.lines().count(), 1);
    }
}
