//! Structured per-file outcomes of a batch run

use crate::error::{ErrorKind, Result, StimulusError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// A file that made it through every stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedFile {
    pub file_name: String,
    pub output_path: PathBuf,
    pub samples: usize,
    pub sample_rate: u32,
}

/// A file that failed in some stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileFailure {
    pub file_name: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl FileFailure {
    pub fn new(file_name: impl Into<String>, error: &StimulusError) -> Self {
        Self {
            file_name: file_name.into(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Summary of a batch run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResult {
    /// Stage names in application order
    pub stages: Vec<String>,
    pub succeeded: usize,
    pub failed: usize,
    pub processed: Vec<ProcessedFile>,
    pub failures: Vec<FileFailure>,
    /// Files left untouched because the run was cancelled
    pub skipped: Vec<String>,
    /// RFC 3339 timestamp of when the run finished
    pub finished_at: Option<String>,
}

impl BatchResult {
    pub fn new(stages: Vec<String>) -> Self {
        Self {
            stages,
            ..Default::default()
        }
    }

    pub fn record_success(&mut self, file: ProcessedFile) {
        self.succeeded += 1;
        self.processed.push(file);
    }

    pub fn record_failure(&mut self, failure: FileFailure) {
        self.failed += 1;
        self.failures.push(failure);
    }

    pub fn record_skipped(&mut self, file_name: String) {
        self.skipped.push(file_name);
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.skipped.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.skipped.is_empty()
    }

    /// Log one line per failure plus the totals
    pub fn log_summary(&self) {
        log::info!(
            "Batch finished: {} succeeded, {} failed, {} skipped",
            self.succeeded,
            self.failed,
            self.skipped.len()
        );
        for failure in &self.failures {
            log::warn!(
                "  {} [{:?}]: {}",
                failure.file_name,
                failure.kind,
                failure.message
            );
        }
    }

    /// Write the report as pretty JSON, overwriting any previous report
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| StimulusError::io(path, std::io::Error::other(e)))?;
        fs::write(path, json).map_err(|e| StimulusError::io(path, e))?;
        log::debug!("Batch report written to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_follow_records() {
        let mut result = BatchResult::new(vec!["align".to_string()]);
        result.record_success(ProcessedFile {
            file_name: "ba.wav".to_string(),
            output_path: PathBuf::from("/out/ba.wav"),
            samples: 19200,
            sample_rate: 48000,
        });
        result.record_failure(FileFailure::new(
            "bad.wav",
            &StimulusError::Config("noise segment too long".to_string()),
        ));
        result.record_skipped("zu.wav".to_string());

        assert_eq!(result.succeeded, 1);
        assert_eq!(result.failed, 1);
        assert_eq!(result.total(), 3);
        assert!(!result.is_clean());
        assert_eq!(result.failures[0].kind, ErrorKind::Config);
    }

    #[test]
    fn test_report_is_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("report.json");

        let mut result = BatchResult::new(vec!["resample".to_string()]);
        result.record_failure(FileFailure::new(
            "x.wav",
            &StimulusError::decode("x.wav", "not a RIFF file"),
        ));
        result.write_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["failed"], 1);
        assert_eq!(value["failures"][0]["kind"], "decode");
    }
}
