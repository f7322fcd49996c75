//! Onset alignment
//!
//! Finds where the syllable's energy rises above a fraction of the clip's
//! peak energy, drops everything before it (minus a short pre-roll so the
//! attack survives) and trims or pads the rest to an exact sample count.
//! The exact count matters: every stimulus must time-lock identically.

use super::traits::Stage;
use crate::error::{Result, StimulusError};
use crate::model::{seconds_to_samples, AudioBuffer};
use serde::{Deserialize, Serialize};

/// Where silence goes when the trimmed clip is shorter than the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaddingPolicy {
    /// Keep the onset near the start, append zeros at the tail
    #[default]
    Tail,
    /// Split the zeros between head and tail
    Centered,
}

/// Onset aligner parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignConfig {
    /// Output duration; output length is `round(duration * sample_rate)`
    pub target_duration_secs: f64,

    /// Fraction of the peak short-window energy that marks the onset
    pub onset_threshold: f64,

    /// Length of the energy window
    pub window_secs: f64,

    /// Audio kept before the detected onset
    pub pre_roll_secs: f64,

    pub padding: PaddingPolicy,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            target_duration_secs: 0.4,
            // 40 % of peak RMS, expressed as an energy fraction
            onset_threshold: 0.16,
            window_secs: 0.010,
            pre_roll_secs: 0.010,
            padding: PaddingPolicy::Tail,
        }
    }
}

impl AlignConfig {
    pub fn with_target_duration(mut self, secs: f64) -> Self {
        self.target_duration_secs = secs;
        self
    }

    pub fn with_onset_threshold(mut self, threshold: f64) -> Self {
        self.onset_threshold = threshold;
        self
    }

    pub fn with_pre_roll(mut self, secs: f64) -> Self {
        self.pre_roll_secs = secs;
        self
    }

    pub fn with_padding(mut self, padding: PaddingPolicy) -> Self {
        self.padding = padding;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.target_duration_secs.is_finite() && self.target_duration_secs > 0.0) {
            return Err(StimulusError::Config(format!(
                "target duration must be positive, got {}",
                self.target_duration_secs
            )));
        }
        if !(0.0..=1.0).contains(&self.onset_threshold) {
            return Err(StimulusError::Config(format!(
                "onset threshold must lie in [0, 1], got {}",
                self.onset_threshold
            )));
        }
        if !(self.window_secs.is_finite() && self.window_secs > 0.0) {
            return Err(StimulusError::Config(format!(
                "energy window must be positive, got {}",
                self.window_secs
            )));
        }
        if !(self.pre_roll_secs.is_finite() && self.pre_roll_secs >= 0.0) {
            return Err(StimulusError::Config(format!(
                "pre-roll must not be negative, got {}",
                self.pre_roll_secs
            )));
        }
        Ok(())
    }
}

/// Index of the first energy window above the threshold
///
/// Returns `None` for silent clips and when nothing exceeds the threshold.
pub fn detect_onset(buffer: &AudioBuffer, config: &AlignConfig) -> Option<usize> {
    let samples = buffer.samples();
    if samples.is_empty() {
        return None;
    }

    let window = buffer.samples_for(config.window_secs).max(1);
    let hop = (window / 4).max(1);

    // prefix[i] = sum of squares of samples[..i]
    let mut prefix = Vec::with_capacity(samples.len() + 1);
    prefix.push(0.0f64);
    let mut acc = 0.0f64;
    for &s in samples {
        acc += s as f64 * s as f64;
        prefix.push(acc);
    }

    let energies: Vec<(usize, f64)> = (0..samples.len())
        .step_by(hop)
        .map(|start| {
            let end = (start + window).min(samples.len());
            (start, (prefix[end] - prefix[start]) / window as f64)
        })
        .collect();

    let peak = energies.iter().map(|&(_, e)| e).fold(0.0f64, f64::max);
    if peak <= 0.0 {
        return None;
    }

    let threshold = config.onset_threshold * peak;
    energies
        .iter()
        .find(|&&(_, e)| e > threshold)
        .map(|&(start, _)| start)
}

/// Onset time in seconds, for batch-wide alignment
pub fn detect_onset_secs(buffer: &AudioBuffer, config: &AlignConfig) -> Option<f64> {
    detect_onset(buffer, config).map(|idx| idx as f64 / buffer.sample_rate() as f64)
}

/// Onset aligner stage
#[derive(Debug, Clone)]
pub struct OnsetAligner {
    config: AlignConfig,
}

impl OnsetAligner {
    pub fn new(config: AlignConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AlignConfig {
        &self.config
    }
}

impl Stage for OnsetAligner {
    fn name(&self) -> &'static str {
        "align"
    }

    fn apply(&self, input: &AudioBuffer) -> Result<AudioBuffer> {
        let config = &self.config;
        let target = seconds_to_samples(config.target_duration_secs, input.sample_rate());
        if target == 0 {
            return Err(StimulusError::Config(format!(
                "target duration {}s is shorter than one sample at {}Hz",
                config.target_duration_secs,
                input.sample_rate()
            )));
        }

        let onset = match detect_onset(input, config) {
            Some(idx) => idx,
            None => {
                log::warn!(
                    "No onset above {:.0}% of peak energy; aligning from the first sample",
                    config.onset_threshold * 100.0
                );
                0
            }
        };

        let start = onset.saturating_sub(input.samples_for(config.pre_roll_secs));
        let body = &input.samples()[start.min(input.len())..];
        let body = &body[..body.len().min(target)];
        let missing = target - body.len();

        let lead = match config.padding {
            PaddingPolicy::Tail => 0,
            PaddingPolicy::Centered => missing / 2,
        };

        let mut out = Vec::with_capacity(target);
        out.resize(lead, 0.0);
        out.extend_from_slice(body);
        out.resize(target, 0.0);

        log::debug!(
            "Aligned: onset at sample {}, kept {} samples, padded {}",
            onset,
            body.len(),
            missing
        );

        Ok(input.with_samples(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::f32::consts::PI;

    /// `silence` seconds of zeros followed by `tone` seconds of 440 Hz
    fn delayed_tone(rate: u32, silence: f64, tone: f64) -> AudioBuffer {
        let lead = seconds_to_samples(silence, rate);
        let body = seconds_to_samples(tone, rate);
        let mut samples = vec![0.0f32; lead];
        samples.extend((0..body).map(|i| 0.5 * (2.0 * PI * 440.0 * i as f32 / rate as f32).sin()));
        AudioBuffer::new(samples, rate).unwrap()
    }

    #[test]
    fn test_output_length_is_exact() {
        let aligner = OnsetAligner::new(AlignConfig::default()).unwrap();
        for (silence, tone) in [(0.1, 0.9), (0.0, 0.05), (0.3, 0.2), (0.0, 2.0)] {
            let out = aligner.apply(&delayed_tone(48000, silence, tone)).unwrap();
            assert_eq!(out.len(), 19200);
            assert_eq!(out.sample_rate(), 48000);
        }

        let out = aligner.apply(&delayed_tone(44100, 0.2, 0.7)).unwrap();
        assert_eq!(out.len(), 17640);
    }

    #[test]
    fn test_onset_found_near_tone_start() {
        let config = AlignConfig::default();
        let buffer = delayed_tone(48000, 0.1, 0.5);
        let onset = detect_onset(&buffer, &config).unwrap();

        // The first window that overlaps the tone enough can start up to one window early
        let window = buffer.samples_for(config.window_secs);
        assert!(onset <= 4800, "onset {} after tone start", onset);
        assert!(onset + window >= 4800, "onset {} too early", onset);
    }

    #[test]
    fn test_leading_silence_trimmed_to_pre_roll() {
        let config = AlignConfig::default();
        let aligner = OnsetAligner::new(config.clone()).unwrap();
        let out = aligner.apply(&delayed_tone(48000, 0.25, 0.5)).unwrap();

        let first_sound = out.samples().iter().position(|s| s.abs() > 1e-6).unwrap();
        let pre_roll = out.samples_for(config.pre_roll_secs);
        let window = out.samples_for(config.window_secs);
        assert!(first_sound >= pre_roll - 1);
        assert!(first_sound <= pre_roll + window);
    }

    #[test]
    fn test_silent_clip_falls_back_to_start() {
        let aligner = OnsetAligner::new(AlignConfig::default()).unwrap();
        let silent = AudioBuffer::new(vec![0.0; 1000], 16000).unwrap();

        assert!(detect_onset(&silent, aligner.config()).is_none());
        let out = aligner.apply(&silent).unwrap();
        assert_eq!(out.len(), 6400);
        assert!(out.samples().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_centered_padding_splits_silence() {
        let config = AlignConfig::default()
            .with_pre_roll(0.0)
            .with_padding(PaddingPolicy::Centered);
        let aligner = OnsetAligner::new(config).unwrap();

        let samples = vec![0.5f32; 1000];
        let out = aligner.apply(&AudioBuffer::new(samples, 10000).unwrap()).unwrap();

        // 4000 target, 1000 kept, 3000 padding split 1500/1500
        assert_eq!(out.len(), 4000);
        assert_eq!(out.samples()[1499], 0.0);
        assert_eq!(out.samples()[1500], 0.5);
        assert_eq!(out.samples()[2499], 0.5);
        assert_eq!(out.samples()[2500], 0.0);
    }

    #[test]
    fn test_input_is_not_mutated() {
        let aligner = OnsetAligner::new(AlignConfig::default()).unwrap();
        let input = delayed_tone(16000, 0.2, 0.1);
        let before = input.clone();
        let _ = aligner.apply(&input).unwrap();
        assert_eq!(input, before);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let err = OnsetAligner::new(AlignConfig::default().with_onset_threshold(1.5)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);

        let err = OnsetAligner::new(AlignConfig::default().with_target_duration(0.0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
