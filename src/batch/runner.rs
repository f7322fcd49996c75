//! Batch orchestration
//!
//! Every file runs through the stage sequence on its own; a failure is
//! recorded against that file and the batch moves on.

use super::config::PipelineConfig;
use super::organizer::{display_name, list_wav_files, DirectoryOrganizer};
use crate::audio::{self, SampleEncoding};
use crate::error::Result;
use crate::model::{BatchResult, FileFailure, ProcessedFile};
use crate::stages::{detect_onset_secs, AlignConfig, StageSequence};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

enum FileOutcome {
    Done(ProcessedFile),
    Failed(FileFailure),
    Skipped(String),
}

/// Applies a stage sequence to every WAV file of a directory
#[derive(Debug, Clone)]
pub struct BatchRunner {
    encoding: SampleEncoding,
    parallel: bool,
    cancel: Option<Arc<AtomicBool>>,
}

impl Default for BatchRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchRunner {
    pub fn new() -> Self {
        Self {
            encoding: SampleEncoding::default(),
            parallel: true,
            cancel: None,
        }
    }

    /// Runner matching a pipeline config's encoding and parallelism
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new()
            .with_encoding(config.encoding)
            .with_parallel(config.parallel)
    }

    pub fn with_encoding(mut self, encoding: SampleEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Files not yet started when the flag is set are skipped
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Process one file and write the result
    ///
    /// Errors propagate to the caller unchanged. On failure no file is left
    /// at `output`, neither a partial write nor one from an earlier run.
    pub fn process_file(
        &self,
        input: &Path,
        output: &Path,
        sequence: &StageSequence,
    ) -> Result<ProcessedFile> {
        let processed = audio::load(input)
            .and_then(|buffer| sequence.apply(&buffer))
            .and_then(|processed| {
                audio::save(&processed, output, self.encoding)?;
                Ok(processed)
            });

        let processed = match processed {
            Ok(processed) => processed,
            Err(e) => {
                remove_stale_output(output);
                return Err(e);
            }
        };

        Ok(ProcessedFile {
            file_name: display_name(input),
            output_path: output.to_path_buf(),
            samples: processed.len(),
            sample_rate: processed.sample_rate(),
        })
    }

    /// Run `sequence` over every WAV file in `input_dir`
    ///
    /// Only whole-run problems (unreadable input directory, unwritable
    /// output directory) are returned as errors.
    pub fn run(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        sequence: &StageSequence,
    ) -> Result<BatchResult> {
        let organizer = DirectoryOrganizer::new(input_dir.to_path_buf(), output_dir.to_path_buf());
        organizer.init()?;

        let files = organizer.input_files()?;
        log::info!(
            "Processing {} file(s) from {:?} with stages {:?}",
            files.len(),
            input_dir,
            sequence.names()
        );

        let total = files.len();
        let process = |(i, input): (usize, &PathBuf)| -> FileOutcome {
            let name = display_name(input);
            if self.cancelled() {
                return FileOutcome::Skipped(name);
            }

            log::info!("[{}/{}] Processing: {}", i + 1, total, name);
            let output = organizer.output_path(input);
            match self.process_file(input, &output, sequence) {
                Ok(done) => {
                    log::debug!("Wrote {:?}", done.output_path);
                    FileOutcome::Done(done)
                }
                Err(e) => {
                    log::warn!("Failed: {}: {}", name, e);
                    FileOutcome::Failed(FileFailure::new(name, &e))
                }
            }
        };

        let outcomes: Vec<FileOutcome> = if self.parallel {
            files.par_iter().enumerate().map(process).collect()
        } else {
            files.iter().enumerate().map(process).collect()
        };

        let mut result = BatchResult::new(sequence.names());
        for outcome in outcomes {
            match outcome {
                FileOutcome::Done(done) => result.record_success(done),
                FileOutcome::Failed(failure) => result.record_failure(failure),
                FileOutcome::Skipped(name) => result.record_skipped(name),
            }
        }
        result.finished_at = Some(chrono::Utc::now().to_rfc3339());

        if !result.skipped.is_empty() {
            log::warn!("Run cancelled; {} file(s) skipped", result.skipped.len());
        }
        Ok(result)
    }

    /// Run the standard chain configured by `config`
    ///
    /// With group alignment on, the earliest onset across all inputs becomes
    /// every file's pre-roll, so all syllables line up on the same time base.
    pub fn run_pipeline(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        config: &PipelineConfig,
    ) -> Result<BatchResult> {
        let mut config = config.clone();
        if config.group_alignment {
            let files = list_wav_files(input_dir)?;
            if let Some(earliest) = earliest_onset(&files, &config.align, self.parallel) {
                // The denoiser profiles the leading segment, which must stay silent
                let floor = config.denoise.noise_profile_secs;
                let pre_roll = if earliest < floor {
                    let kept = config.align.pre_roll_secs.max(earliest);
                    log::warn!(
                        "Group alignment: earliest onset at {:.3}s leaves no room for the {:.3}s noise segment; using {:.3}s pre-roll",
                        earliest,
                        floor,
                        kept
                    );
                    kept
                } else {
                    log::info!(
                        "Group alignment: earliest onset at {:.3}s used as pre-roll",
                        earliest
                    );
                    earliest
                };
                config.align = config.align.with_pre_roll(pre_roll);
            } else {
                log::warn!("Group alignment: no onset found in any file; keeping configured pre-roll");
            }
        }

        let sequence = config.standard_sequence()?;
        self.run(input_dir, output_dir, &sequence)
    }
}

/// Earliest detected onset in seconds across `files`; unreadable files are ignored
fn earliest_onset(files: &[PathBuf], align: &AlignConfig, parallel: bool) -> Option<f64> {
    let onset = |path: &PathBuf| match audio::load(path) {
        Ok(buffer) => detect_onset_secs(&buffer, align),
        Err(e) => {
            log::debug!("Onset pre-scan skipped {:?}: {}", path, e);
            None
        }
    };

    if parallel {
        files.par_iter().filter_map(onset).min_by(|a, b| a.total_cmp(b))
    } else {
        files.iter().filter_map(onset).min_by(|a, b| a.total_cmp(b))
    }
}

fn remove_stale_output(output: &Path) {
    match std::fs::remove_file(output) {
        Ok(()) => log::debug!("Removed stale output {:?}", output),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Could not remove stale output {:?}: {}", output, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AudioBuffer;
    use crate::stages::{ResampleConfig, Resampler};
    use tempfile::TempDir;

    fn write_clip(dir: &Path, name: &str, rate: u32, len: usize) {
        let samples = (0..len).map(|i| ((i % 100) as f32 / 100.0) - 0.5).collect();
        let buffer = AudioBuffer::new(samples, rate).unwrap();
        audio::save(&buffer, &dir.join(name), SampleEncoding::Float32).unwrap();
    }

    #[test]
    fn test_malformed_files_are_isolated() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_clip(input.path(), "ba.wav", 16000, 1600);
        write_clip(input.path(), "da.wav", 22050, 2205);
        std::fs::write(input.path().join("broken.wav"), b"RIFF....garbage").unwrap();

        let sequence =
            StageSequence::new().then(Resampler::new(ResampleConfig::default()).unwrap());
        let result = BatchRunner::new()
            .with_parallel(false)
            .run(input.path(), output.path(), &sequence)
            .unwrap();

        assert_eq!(result.succeeded, 2);
        assert_eq!(result.failed, 1);
        assert_eq!(result.failures[0].file_name, "broken.wav");
        assert!(output.path().join("ba.wav").exists());
        assert!(output.path().join("da.wav").exists());
        assert!(!output.path().join("broken.wav").exists());
    }

    #[test]
    fn test_cancelled_run_skips_everything() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_clip(input.path(), "ba.wav", 16000, 1600);
        write_clip(input.path(), "ga.wav", 16000, 1600);

        let flag = Arc::new(AtomicBool::new(true));
        let result = BatchRunner::new()
            .with_cancel_flag(flag)
            .run(input.path(), output.path(), &StageSequence::new())
            .unwrap();

        assert_eq!(result.succeeded, 0);
        assert_eq!(result.skipped, vec!["ba.wav", "ga.wav"]);
    }

    #[test]
    fn test_process_file_propagates_errors() {
        let dir = TempDir::new().unwrap();
        let err = BatchRunner::new()
            .process_file(
                &dir.path().join("missing.wav"),
                &dir.path().join("out.wav"),
                &StageSequence::new(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Io);
    }

    #[test]
    fn test_earliest_onset_across_files() {
        let dir = TempDir::new().unwrap();
        for (name, lead) in [("a.wav", 1600usize), ("b.wav", 800), ("c.wav", 3200)] {
            let mut samples = vec![0.0f32; lead];
            samples.extend(std::iter::repeat(0.5).take(1600));
            let buffer = AudioBuffer::new(samples, 16000).unwrap();
            audio::save(&buffer, &dir.path().join(name), SampleEncoding::Float32).unwrap();
        }

        let files = list_wav_files(dir.path()).unwrap();
        let earliest = earliest_onset(&files, &AlignConfig::default(), true).unwrap();
        // 800 samples at 16 kHz = 0.05 s, detected up to one window early
        assert!(earliest <= 0.05 && earliest >= 0.04, "earliest {}", earliest);

        let sequential = earliest_onset(&files, &AlignConfig::default(), false).unwrap();
        assert_eq!(sequential, earliest);
    }

    #[test]
    fn test_failed_rerun_removes_previous_output() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_clip(input.path(), "ba.wav", 16000, 1600);

        let runner = BatchRunner::new().with_parallel(false);
        let first = runner
            .run(input.path(), output.path(), &StageSequence::new())
            .unwrap();
        assert_eq!(first.succeeded, 1);
        assert!(output.path().join("ba.wav").exists());

        // Same name, now undecodable
        std::fs::write(input.path().join("ba.wav"), b"not a wav any more").unwrap();
        let second = runner
            .run(input.path(), output.path(), &StageSequence::new())
            .unwrap();
        assert_eq!(second.failed, 1);
        assert!(!output.path().join("ba.wav").exists());
    }

    #[test]
    fn test_clipping_output_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("ba.wav");
        let output = dir.path().join("out.wav");
        write_clip(dir.path(), "ba.wav", 16000, 1600);
        std::fs::write(&output, b"stale").unwrap();

        struct Boost;
        impl crate::stages::Stage for Boost {
            fn name(&self) -> &'static str {
                "boost"
            }
            fn apply(&self, input: &AudioBuffer) -> Result<AudioBuffer> {
                Ok(input.with_samples(input.samples().iter().map(|s| s * 4.0).collect()))
            }
        }

        let err = BatchRunner::new()
            .process_file(&input, &output, &StageSequence::new().then(Boost))
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Clipping);
        assert!(!output.exists());
    }
}
