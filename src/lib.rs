//! Syllable stimuli - batch preparation of spoken-syllable recordings
//!
//! Raw recordings are aligned to their onset, loudness-normalized,
//! denoised, resampled and low-pass smoothed into fixed-length clips
//! suitable for psychoacoustic experiments.

pub mod audio;
pub mod batch;
pub mod error;
pub mod model;
pub mod rename;
pub mod stages;
pub mod validation;

pub use batch::{BatchRunner, PipelineConfig};
pub use error::{ErrorKind, Result, StimulusError};
pub use model::{AudioBuffer, BatchResult};
pub use stages::{Stage, StageSequence};
