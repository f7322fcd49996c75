//! Fixed-window trim
//!
//! Cuts the same absolute window out of every clip, for stimulus sets whose
//! onsets were already aligned by hand. Output length is always
//! `round(end * rate) - round(start * rate)`; missing samples become zeros.

use super::traits::Stage;
use crate::error::{Result, StimulusError};
use crate::model::AudioBuffer;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrimConfig {
    pub start_secs: f64,
    pub end_secs: f64,
}

impl TrimConfig {
    pub fn new(start_secs: f64, end_secs: f64) -> Self {
        Self {
            start_secs,
            end_secs,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.start_secs.is_finite() && self.start_secs >= 0.0) {
            return Err(StimulusError::Config(format!(
                "trim start must not be negative, got {}",
                self.start_secs
            )));
        }
        if !(self.end_secs.is_finite() && self.end_secs > self.start_secs) {
            return Err(StimulusError::Config(format!(
                "trim end {} must come after start {}",
                self.end_secs, self.start_secs
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Trimmer {
    config: TrimConfig,
}

impl Trimmer {
    pub fn new(config: TrimConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl Stage for Trimmer {
    fn name(&self) -> &'static str {
        "trim"
    }

    fn apply(&self, input: &AudioBuffer) -> Result<AudioBuffer> {
        let start = input.samples_for(self.config.start_secs);
        let end = input.samples_for(self.config.end_secs);
        if end <= start {
            return Err(StimulusError::Config(format!(
                "trim window {}s..{}s is empty at {}Hz",
                self.config.start_secs,
                self.config.end_secs,
                input.sample_rate()
            )));
        }

        let samples = input.samples();
        let available = &samples[start.min(samples.len())..end.min(samples.len())];

        let mut out = Vec::with_capacity(end - start);
        out.extend_from_slice(available);
        out.resize(end - start, 0.0);

        Ok(input.with_samples(out))
    }
}
