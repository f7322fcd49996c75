//! FFT-based sample rate conversion
//!
//! The whole clip is transformed, its spectrum truncated (downsampling) or
//! zero-extended (upsampling) and transformed back. Truncation removes all
//! content above the new Nyquist frequency, so anti-aliasing is part of the
//! conversion. Clips are short, so one transform per clip is cheap.

use super::traits::Stage;
use crate::error::{Result, StimulusError};
use crate::model::AudioBuffer;
use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};

/// Resampler parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResampleConfig {
    pub target_sample_rate: u32,
}

impl Default for ResampleConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 48000,
        }
    }
}

impl ResampleConfig {
    pub fn with_target_rate(mut self, rate: u32) -> Self {
        self.target_sample_rate = rate;
        self
    }
}

/// Output length for `len` samples converted from `from` Hz to `to` Hz, rounded
pub fn resampled_len(len: usize, from: u32, to: u32) -> usize {
    let num = len as u128 * to as u128;
    let den = from as u128;
    ((num + den / 2) / den) as usize
}

/// Resampler stage
#[derive(Debug, Clone)]
pub struct Resampler {
    config: ResampleConfig,
}

impl Resampler {
    pub fn new(config: ResampleConfig) -> Result<Self> {
        if config.target_sample_rate == 0 {
            return Err(StimulusError::Config(
                "target sample rate must be positive".to_string(),
            ));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &ResampleConfig {
        &self.config
    }
}

impl Stage for Resampler {
    fn name(&self) -> &'static str {
        "resample"
    }

    fn apply(&self, input: &AudioBuffer) -> Result<AudioBuffer> {
        let from = input.sample_rate();
        let to = self.config.target_sample_rate;

        if from == to {
            log::debug!("Sample rate already at {}Hz, skipping resample", to);
            return Ok(input.clone());
        }

        let out_len = resampled_len(input.len(), from, to);
        let samples = resample_fft(input.samples(), out_len);

        log::debug!(
            "Resampled {}Hz -> {}Hz: {} samples -> {} samples",
            from,
            to,
            input.len(),
            samples.len()
        );

        AudioBuffer::new(samples, to)
    }
}

fn resample_fft(input: &[f32], out_len: usize) -> Vec<f32> {
    let in_len = input.len();
    if in_len == 0 || out_len == 0 {
        return vec![0.0; out_len];
    }

    let mut planner = FftPlanner::<f64>::new();

    let mut spectrum: Vec<Complex<f64>> = input
        .iter()
        .map(|&s| Complex::new(s as f64, 0.0))
        .collect();
    planner.plan_fft_forward(in_len).process(&mut spectrum);

    let mut resized = vec![Complex::new(0.0f64, 0.0); out_len];
    let shared = in_len.min(out_len);

    // Non-negative frequencies up to (and including) the shared Nyquist bin
    for k in 0..=shared / 2 {
        resized[k] = spectrum[k];
    }
    // Negative frequencies strictly below the shared Nyquist bin
    for k in 1..(shared + 1) / 2 {
        resized[out_len - k] = spectrum[in_len - k];
    }

    if shared % 2 == 0 {
        let nyq = shared / 2;
        if out_len < in_len {
            // Fold the discarded negative Nyquist component back in
            resized[nyq] += spectrum[in_len - nyq];
        } else {
            // Split the old Nyquist bin across both new halves
            let half = spectrum[nyq] * 0.5;
            resized[nyq] = half;
            resized[out_len - nyq] = half;
        }
    }

    planner.plan_fft_inverse(out_len).process(&mut resized);

    let scale = 1.0 / in_len as f64;
    resized.iter().map(|c| (c.re * scale) as f32).collect()
}
