//! Signal-processing stages
//!
//! Every stage is a pure `AudioBuffer -> AudioBuffer` transformation built
//! from an immutable config. The standard chain is
//! align → loudness → denoise → resample → smooth.

mod align;
mod denoise;
mod loudness;
mod resample;
mod sequence;
mod smooth;
mod traits;
mod trim;

pub use align::{detect_onset, detect_onset_secs, AlignConfig, OnsetAligner, PaddingPolicy};
pub use denoise::{DenoiseConfig, Denoiser};
pub use loudness::{measure_loudness, LoudnessConfig, LoudnessNormalizer};
pub use resample::{resampled_len, ResampleConfig, Resampler};
pub use sequence::StageSequence;
pub use smooth::{SmoothConfig, SpectralSmoother};
pub use traits::Stage;
pub use trim::{TrimConfig, Trimmer};
