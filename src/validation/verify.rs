//! Output verification
//!
//! Reloads every written clip and checks it against the shape the pipeline
//! promises: sample rate, exact length, amplitude range and loudness.

use crate::audio;
use crate::batch::organizer::display_name;
use crate::batch::{list_wav_files, PipelineConfig};
use crate::error::Result;
use crate::model::seconds_to_samples;
use crate::stages::measure_loudness;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What every verified file should look like; `None` skips a check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expectations {
    pub sample_rate: Option<u32>,
    pub samples: Option<usize>,
    pub target_lufs: Option<f64>,
    /// Allowed loudness deviation in LU
    pub loudness_tolerance: f64,
}

impl Default for Expectations {
    fn default() -> Self {
        Self {
            sample_rate: None,
            samples: None,
            target_lufs: None,
            loudness_tolerance: 0.5,
        }
    }
}

impl Expectations {
    /// Expectations for the output of the standard chain
    pub fn from_config(config: &PipelineConfig) -> Self {
        let rate = config.resample.target_sample_rate;
        Self {
            sample_rate: Some(rate),
            samples: Some(seconds_to_samples(config.align.target_duration_secs, rate)),
            target_lufs: Some(config.loudness.target_lufs),
            ..Default::default()
        }
    }

    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = Some(rate);
        self
    }

    pub fn with_samples(mut self, samples: usize) -> Self {
        self.samples = Some(samples);
        self
    }

    pub fn with_loudness(mut self, target_lufs: f64, tolerance: f64) -> Self {
        self.target_lufs = Some(target_lufs);
        self.loudness_tolerance = tolerance;
        self
    }
}

/// Result of checking a single file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileCheck {
    pub file_name: String,
    pub sample_rate: Option<u32>,
    pub samples: Option<usize>,
    pub peak: Option<f32>,
    pub loudness_lufs: Option<f64>,
    pub problems: Vec<String>,
}

impl FileCheck {
    pub fn passed(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Per-file verification results, in sorted file order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyReport {
    pub files: Vec<FileCheck>,
}

impl VerifyReport {
    pub fn all_passed(&self) -> bool {
        self.files.iter().all(FileCheck::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileCheck> {
        self.files.iter().filter(|f| !f.passed())
    }

    pub fn log_summary(&self) {
        let failed = self.failures().count();
        if failed == 0 {
            log::info!("Verified {} file(s), all passed", self.files.len());
            return;
        }
        log::warn!(
            "Verified {} file(s), {} with problems:",
            self.files.len(),
            failed
        );
        for check in self.failures() {
            log::warn!("  {}: {}", check.file_name, check.problems.join("; "));
        }
    }
}

/// Check every WAV file in `dir`
///
/// Unreadable files are recorded as problems; only a failure to list the
/// directory is returned as an error.
pub fn verify_output(dir: &Path, expect: &Expectations) -> Result<VerifyReport> {
    let files = list_wav_files(dir)?;
    log::info!("Verifying {} file(s) in {:?}", files.len(), dir);

    let files = files
        .iter()
        .map(|path| verify_file(path, expect))
        .collect();
    Ok(VerifyReport { files })
}

fn verify_file(path: &Path, expect: &Expectations) -> FileCheck {
    let mut check = FileCheck {
        file_name: display_name(path),
        sample_rate: None,
        samples: None,
        peak: None,
        loudness_lufs: None,
        problems: Vec::new(),
    };

    let buffer = match audio::load(path) {
        Ok(buffer) => buffer,
        Err(e) => {
            check.problems.push(e.to_string());
            return check;
        }
    };

    check.sample_rate = Some(buffer.sample_rate());
    check.samples = Some(buffer.len());
    check.peak = Some(buffer.peak());

    if let Some(rate) = expect.sample_rate {
        if buffer.sample_rate() != rate {
            check
                .problems
                .push(format!("sample rate {} Hz, expected {} Hz", buffer.sample_rate(), rate));
        }
    }
    if let Some(samples) = expect.samples {
        if buffer.len() != samples {
            check
                .problems
                .push(format!("{} samples, expected {}", buffer.len(), samples));
        }
    }
    if let Err(e) = buffer.ensure_in_range() {
        check.problems.push(e.to_string());
    }

    if let Some(target) = expect.target_lufs {
        match measure_loudness(&buffer) {
            Ok(lufs) => {
                check.loudness_lufs = Some(lufs);
                if (lufs - target).abs() > expect.loudness_tolerance {
                    check.problems.push(format!(
                        "loudness {:.2} LUFS, expected {:.1} ± {:.1}",
                        lufs, target, expect.loudness_tolerance
                    ));
                }
            }
            Err(e) => check.problems.push(e.to_string()),
        }
    }

    check
}
