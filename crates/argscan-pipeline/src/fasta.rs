//! FASTA parsing and validation oracle.

use std::path::Path;

use argscan_core::error::AppError;
use argscan_core::result::AppResult;
use tokio::fs;

/// One record of a FASTA file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord {
    /// Record identifier (first whitespace-delimited token after `>`).
    pub id: String,
    /// Concatenated sequence lines.
    pub sequence: String,
}

/// Parse a FASTA file into its records.
///
/// Fails with `NotFound` when the file is missing and `Validation` when it
/// cannot be read as FASTA.
pub async fn parse_fasta(path: &Path) -> AppResult<Vec<FastaRecord>> {
    let text = fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AppError::not_found(format!("File not found: {}", path.display()))
        } else {
            AppError::with_source(
                argscan_core::error::ErrorKind::Storage,
                format!("Failed to read FASTA: {}", path.display()),
                e,
            )
        }
    })?;

    let mut records: Vec<FastaRecord> = Vec::new();
    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        if let Some(header) = line.strip_prefix('>') {
            let id = header.split_whitespace().next().unwrap_or("").to_string();
            records.push(FastaRecord {
                id,
                sequence: String::new(),
            });
        } else if let Some(current) = records.last_mut() {
            current.sequence.push_str(line);
        } else {
            return Err(AppError::validation(format!(
                "Sequence data before first FASTA header in {}",
                path.display()
            )));
        }
    }
    Ok(records)
}

/// Validate that a path points to a readable FASTA with plausible
/// nucleotide sequences.
///
/// The file must exist, parse into at least one record, and every sequence
/// must contain at least one valid nucleotide character (ACGTN, either
/// case). Missing files surface as `NotFound`; everything else as
/// `Validation`.
pub async fn validate_fasta(path: &Path) -> AppResult<()> {
    let records = parse_fasta(path).await?;
    if records.is_empty() {
        return Err(AppError::validation(format!(
            "FASTA file is empty or invalid: {}",
            path.display()
        )));
    }
    for record in &records {
        let has_nucleotides = record
            .sequence
            .chars()
            .any(|c| matches!(c.to_ascii_uppercase(), 'A' | 'C' | 'G' | 'T' | 'N'));
        if !has_nucleotides {
            return Err(AppError::validation(format!(
                "FASTA sequences do not appear to be valid nucleotides: {}",
                path.display()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        tokio::fs::write(&path, content).await.unwrap();
        path
    }

    #[tokio::test]
    async fn parses_multi_record_fasta() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            &tmp,
            "genes.fasta",
            ">blaTEM-1 beta-lactamase\nATGAGT\nACCGGT\n>tetA\nGGTACC\n",
        )
        .await;

        let records = parse_fasta(&path).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "blaTEM-1");
        assert_eq!(records[0].sequence, "ATGAGTACCGGT");
        assert_eq!(records[1].id, "tetA");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = validate_fasta(&tmp.path().join("absent.fasta"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn empty_fasta_is_invalid() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "empty.fasta", "").await;
        let err = validate_fasta(&path).await.unwrap_err();
        assert_eq!(err.kind, argscan_core::error::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn non_nucleotide_sequences_are_invalid() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "junk.fasta", ">rec1\nXXXXQQQQ\n").await;
        let err = validate_fasta(&path).await.unwrap_err();
        assert_eq!(err.kind, argscan_core::error::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn valid_fasta_passes() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "ok.fasta", ">rec1\nacgtn\n>rec2\nACGT\n").await;
        assert!(validate_fasta(&path).await.is_ok());
    }
}
