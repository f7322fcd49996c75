//! Integrated loudness normalization (EBU R128 / ITU-R BS.1770)
//!
//! Measurement uses K-weighting with absolute (-70 LUFS) and relative
//! (-10 LU) gating over 400 ms blocks. A clip shorter than one block has
//! no integrated loudness and is reported as a measurement failure.

use super::traits::Stage;
use crate::error::{Result, StimulusError};
use crate::model::AudioBuffer;
use ebur128::{EbuR128, Mode};
use serde::{Deserialize, Serialize};

/// Loudness normalizer parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoudnessConfig {
    pub target_lufs: f64,
}

impl Default for LoudnessConfig {
    fn default() -> Self {
        Self { target_lufs: -23.0 }
    }
}

impl LoudnessConfig {
    pub fn with_target(mut self, lufs: f64) -> Self {
        self.target_lufs = lufs;
        self
    }
}

/// Measure integrated loudness of a mono buffer in LUFS
pub fn measure_loudness(buffer: &AudioBuffer) -> Result<f64> {
    let mut meter = EbuR128::new(1, buffer.sample_rate(), Mode::I)
        .map_err(|e| StimulusError::Config(format!("cannot build loudness meter: {}", e)))?;

    meter
        .add_frames_f32(buffer.samples())
        .map_err(|e| StimulusError::Measurement(e.to_string()))?;

    let lufs = meter
        .loudness_global()
        .map_err(|e| StimulusError::Measurement(e.to_string()))?;

    if !lufs.is_finite() {
        return Err(StimulusError::Measurement(format!(
            "no gating block above the absolute threshold ({:.3}s of audio)",
            buffer.duration_secs()
        )));
    }

    Ok(lufs)
}

/// Loudness normalizer stage
///
/// Applies one static gain. When that gain would push the peak past full
/// scale the stage fails with `Clipping` instead of limiting.
#[derive(Debug, Clone)]
pub struct LoudnessNormalizer {
    config: LoudnessConfig,
}

impl LoudnessNormalizer {
    pub fn new(config: LoudnessConfig) -> Result<Self> {
        if !config.target_lufs.is_finite() || config.target_lufs >= 0.0 {
            return Err(StimulusError::Config(format!(
                "target loudness must be below 0 LUFS, got {}",
                config.target_lufs
            )));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &LoudnessConfig {
        &self.config
    }
}

impl Stage for LoudnessNormalizer {
    fn name(&self) -> &'static str {
        "loudness"
    }

    fn apply(&self, input: &AudioBuffer) -> Result<AudioBuffer> {
        let measured = measure_loudness(input)?;
        let gain_db = self.config.target_lufs - measured;
        let gain = 10f64.powf(gain_db / 20.0);

        let out: Vec<f32> = input
            .samples()
            .iter()
            .map(|&s| (s as f64 * gain) as f32)
            .collect();
        let out = input.with_samples(out);

        let peak = out.peak();
        if peak > 1.0 {
            return Err(StimulusError::Clipping { peak });
        }

        log::debug!(
            "Loudness {:.2} LUFS -> {:.2} LUFS (gain {:+.2} dB, peak {:.3})",
            measured,
            self.config.target_lufs,
            gain_db,
            peak
        );

        Ok(out)
    }
}
