//! Batch configuration

use crate::audio::SampleEncoding;
use crate::error::{Result, StimulusError};
use crate::stages::{
    AlignConfig, DenoiseConfig, Denoiser, LoudnessConfig, LoudnessNormalizer, OnsetAligner,
    ResampleConfig, Resampler, SmoothConfig, SpectralSmoother, StageSequence,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Configuration for a full processing run
///
/// Stage configs are immutable values shared read-only by every file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub align: AlignConfig,
    pub loudness: LoudnessConfig,
    pub denoise: DenoiseConfig,
    pub resample: ResampleConfig,
    pub smooth: SmoothConfig,

    /// Sample format of written files
    pub encoding: SampleEncoding,

    /// Process files on the rayon thread pool
    pub parallel: bool,

    /// Use the earliest onset across the batch as every file's pre-roll
    pub group_alignment: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            align: AlignConfig::default(),
            loudness: LoudnessConfig::default(),
            denoise: DenoiseConfig::default(),
            resample: ResampleConfig::default(),
            smooth: SmoothConfig::default(),
            encoding: SampleEncoding::default(),
            parallel: true,
            group_alignment: false,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file; missing fields keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| StimulusError::io(path, e))?;
        serde_json::from_str(&text)
            .map_err(|e| StimulusError::Config(format!("{:?}: {}", path, e)))
    }

    pub fn with_align(mut self, align: AlignConfig) -> Self {
        self.align = align;
        self
    }

    pub fn with_loudness(mut self, loudness: LoudnessConfig) -> Self {
        self.loudness = loudness;
        self
    }

    pub fn with_denoise(mut self, denoise: DenoiseConfig) -> Self {
        self.denoise = denoise;
        self
    }

    pub fn with_resample(mut self, resample: ResampleConfig) -> Self {
        self.resample = resample;
        self
    }

    pub fn with_smooth(mut self, smooth: SmoothConfig) -> Self {
        self.smooth = smooth;
        self
    }

    pub fn with_encoding(mut self, encoding: SampleEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_group_alignment(mut self, enabled: bool) -> Self {
        self.group_alignment = enabled;
        self
    }

    /// Align → loudness → denoise → resample → smooth
    pub fn standard_sequence(&self) -> Result<StageSequence> {
        Ok(StageSequence::new()
            .then(OnsetAligner::new(self.align.clone())?)
            .then(LoudnessNormalizer::new(self.loudness.clone())?)
            .then(Denoiser::new(self.denoise.clone())?)
            .then(Resampler::new(self.resample.clone())?)
            .then(SpectralSmoother::new(self.smooth.clone())?))
    }
}
