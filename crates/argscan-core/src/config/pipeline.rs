//! Detection pipeline defaults.

use serde::{Deserialize, Serialize};

/// Default parameters used when a job submission omits pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Path to the resistance gene database FASTA.
    #[serde(default = "default_db")]
    pub db: String,
    /// Path to the gene-to-class CSV mapping.
    #[serde(default = "default_map")]
    pub map: String,
    /// Minimum percent identity for accepted hits.
    #[serde(default = "default_identity")]
    pub identity: f64,
    /// Minimum alignment coverage in base pairs.
    #[serde(default = "default_coverage")]
    pub coverage: u64,
    /// Worker threads for batch processing inside a single run.
    #[serde(default = "default_threads")]
    pub threads: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            db: default_db(),
            map: default_map(),
            identity: default_identity(),
            coverage: default_coverage(),
            threads: default_threads(),
        }
    }
}

fn default_db() -> String {
    "data/resistance_genes.fasta".to_string()
}

fn default_map() -> String {
    "data/gene_class_map.csv".to_string()
}

fn default_identity() -> f64 {
    90.0
}

fn default_coverage() -> u64 {
    80
}

fn default_threads() -> usize {
    1
}
