use super::traits::ConfigSection;
use crate::error::{CodonOptError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub checkpoint_file: String,
    pub fasta_file: String,
    pub parameters_file: String,
    pub report_file: String,
    pub fasta_line_width: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("codonopt-output"),
            checkpoint_file: "checkpoints.tsv".to_string(),
            fasta_file: "best-sequence.fasta".to_string(),
            parameters_file: "parameters.json".to_string(),
            report_file: "report.json".to_string(),
            fasta_line_width: 72,
        }
    }
}

impl OutputConfig {
    pub fn checkpoint_path(&self) -> PathBuf {
        self.directory.join(&self.checkpoint_file)
    }

    pub fn fasta_path(&self) -> PathBuf {
        self.directory.join(&self.fasta_file)
    }

    pub fn parameters_path(&self) -> PathBuf {
        self.directory.join(&self.parameters_file)
    }

    pub fn report_path(&self) -> PathBuf {
        self.directory.join(&self.report_file)
    }
}

impl ConfigSection for OutputConfig {
    fn section_name() -> &'static str {
        "output"
    }

    fn validate(&self) -> Result<()> {
        if self.fasta_line_width == 0 {
            return Err(CodonOptError::Configuration(
                "FASTA line width must be at least 1".to_string(),
            ));
        }
        if self.checkpoint_file.is_empty() || self.fasta_file.is_empty() {
            return Err(CodonOptError::Configuration(
                "Output file names cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}
