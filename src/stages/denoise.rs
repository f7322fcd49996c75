//! Spectral subtraction denoiser
//!
//! The noise fingerprint is the mean STFT magnitude of a leading segment
//! assumed to hold no speech. Every frame of the clip then has that
//! magnitude subtracted per bin (floored at zero) and is resynthesised
//! with its original phase by weighted overlap-add.

use super::traits::Stage;
use crate::error::{Result, StimulusError};
use crate::model::AudioBuffer;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::sync::Arc;

/// Magnitudes below this are treated as empty bins
const MAG_FLOOR: f32 = 1e-12;

/// Overlap-add weight below which a sample is considered uncovered
const WSUM_FLOOR: f32 = 1e-8;

/// Denoiser parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DenoiseConfig {
    /// Length of the leading noise-only segment
    pub noise_profile_secs: f64,

    /// Proportion of the noise profile removed from each bin
    pub reduction: f32,

    /// STFT frame length in samples
    pub frame_size: usize,

    /// STFT hop in samples, at most half a frame
    pub hop_size: usize,

    /// Highest level of the noise segment relative to the whole clip, in dB.
    /// Louder segments hold signal, not noise, and the clip is left untouched.
    pub max_profile_level_db: f64,
}

impl Default for DenoiseConfig {
    fn default() -> Self {
        Self {
            noise_profile_secs: 0.010,
            reduction: 1.0,
            frame_size: 1024,
            hop_size: 256,
            max_profile_level_db: -20.0,
        }
    }
}

impl DenoiseConfig {
    pub fn with_noise_profile(mut self, secs: f64) -> Self {
        self.noise_profile_secs = secs;
        self
    }

    pub fn with_reduction(mut self, reduction: f32) -> Self {
        self.reduction = reduction;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.noise_profile_secs.is_finite() && self.noise_profile_secs >= 0.0) {
            return Err(StimulusError::Config(format!(
                "noise profile length must not be negative, got {}",
                self.noise_profile_secs
            )));
        }
        if !(self.reduction.is_finite() && (0.0..=1.0).contains(&self.reduction)) {
            return Err(StimulusError::Config(format!(
                "noise reduction must lie in [0, 1], got {}",
                self.reduction
            )));
        }
        if !(self.max_profile_level_db.is_finite() && self.max_profile_level_db <= 0.0) {
            return Err(StimulusError::Config(format!(
                "noise segment level limit must be at most 0 dB, got {}",
                self.max_profile_level_db
            )));
        }
        if self.frame_size < 16 {
            return Err(StimulusError::Config(format!(
                "STFT frame of {} samples is too short",
                self.frame_size
            )));
        }
        if self.hop_size == 0 || self.hop_size > self.frame_size / 2 {
            return Err(StimulusError::Config(format!(
                "STFT hop must lie in 1..={}, got {}",
                self.frame_size / 2,
                self.hop_size
            )));
        }
        Ok(())
    }
}

/// Periodic Hann window
fn hann_window(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / len as f32).cos())
        .collect()
}

fn mean_square(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|&s| s as f64 * s as f64).sum::<f64>() / samples.len() as f64
}

/// Level of `segment` relative to `whole` in dB; `-inf` for a silent segment
fn relative_level_db(segment: &[f32], whole: &[f32]) -> f64 {
    let seg = mean_square(segment);
    let all = mean_square(whole);
    if seg <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if all <= 0.0 {
        return 0.0;
    }
    10.0 * (seg / all).log10()
}

/// Spectral subtraction stage
pub struct Denoiser {
    config: DenoiseConfig,
    window: Vec<f32>,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

impl std::fmt::Debug for Denoiser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Denoiser").field("config", &self.config).finish()
    }
}

impl Denoiser {
    pub fn new(config: DenoiseConfig) -> Result<Self> {
        config.validate()?;
        let mut planner = FftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(config.frame_size);
        let inverse = planner.plan_fft_inverse(config.frame_size);
        let window = hann_window(config.frame_size);
        Ok(Self {
            config,
            window,
            forward,
            inverse,
        })
    }

    pub fn config(&self) -> &DenoiseConfig {
        &self.config
    }

    /// Mean windowed magnitude per bin over the noise segment
    ///
    /// Segments shorter than a frame use a shorter Hann window, rescaled so
    /// the expected magnitude of stationary noise matches a full frame.
    fn noise_profile(&self, segment: &[f32]) -> Vec<f32> {
        let n = self.config.frame_size;
        let hop = self.config.hop_size;
        let mut profile = vec![0.0f32; n];
        let mut buf = vec![Complex::new(0.0f32, 0.0); n];

        if segment.len() < n {
            let short = hann_window(segment.len());
            let full_energy: f32 = self.window.iter().map(|w| w * w).sum();
            let short_energy: f32 = short.iter().map(|w| w * w).sum();
            let scale = if short_energy > 0.0 {
                (full_energy / short_energy).sqrt()
            } else {
                0.0
            };

            for (i, slot) in buf.iter_mut().enumerate() {
                let x = segment.get(i).copied().unwrap_or(0.0);
                let w = short.get(i).copied().unwrap_or(0.0);
                *slot = Complex::new(x * w, 0.0);
            }
            self.forward.process(&mut buf);
            for (p, c) in profile.iter_mut().zip(&buf) {
                *p = c.norm() * scale;
            }
            return profile;
        }

        let mut frames = 0usize;
        let mut start = 0usize;
        while start + n <= segment.len() {
            for (i, slot) in buf.iter_mut().enumerate() {
                *slot = Complex::new(segment[start + i] * self.window[i], 0.0);
            }
            self.forward.process(&mut buf);
            for (p, c) in profile.iter_mut().zip(&buf) {
                *p += c.norm();
            }
            frames += 1;
            start += hop;
        }

        let inv = 1.0 / frames as f32;
        profile.iter_mut().for_each(|p| *p *= inv);
        profile
    }

    fn subtract(&self, samples: &[f32], profile: &[f32]) -> Vec<f32> {
        let n = self.config.frame_size;
        let hop = self.config.hop_size;
        let reduction = self.config.reduction;

        // Pad a full frame on both sides so every sample sees the same overlap
        let padded_len = samples.len() + 2 * n;
        let frame_count = (padded_len - n).div_ceil(hop) + 1;
        let total = (frame_count - 1) * hop + n;

        let mut padded = vec![0.0f32; total];
        padded[n..n + samples.len()].copy_from_slice(samples);

        let mut out = vec![0.0f32; total];
        let mut wsum = vec![0.0f32; total];
        let mut buf = vec![Complex::new(0.0f32, 0.0); n];
        let norm = 1.0 / n as f32;

        for frame in 0..frame_count {
            let start = frame * hop;
            for (i, slot) in buf.iter_mut().enumerate() {
                *slot = Complex::new(padded[start + i] * self.window[i], 0.0);
            }
            self.forward.process(&mut buf);

            for (bin, noise) in buf.iter_mut().zip(profile) {
                let mag = bin.norm();
                if mag > MAG_FLOOR {
                    let cleaned = (mag - reduction * noise).max(0.0);
                    *bin *= cleaned / mag;
                } else {
                    *bin = Complex::new(0.0, 0.0);
                }
            }

            self.inverse.process(&mut buf);
            for (i, c) in buf.iter().enumerate() {
                let w = self.window[i];
                out[start + i] += c.re * norm * w;
                wsum[start + i] += w * w;
            }
        }

        out[n..n + samples.len()]
            .iter()
            .zip(&wsum[n..n + samples.len()])
            .map(|(&y, &w)| if w > WSUM_FLOOR { y / w } else { 0.0 })
            .collect()
    }
}

impl Stage for Denoiser {
    fn name(&self) -> &'static str {
        "denoise"
    }

    fn apply(&self, input: &AudioBuffer) -> Result<AudioBuffer> {
        let noise_len = input.samples_for(self.config.noise_profile_secs);
        if noise_len > input.len() {
            return Err(StimulusError::Config(format!(
                "noise segment of {:.3}s is longer than the {:.3}s clip",
                self.config.noise_profile_secs,
                input.duration_secs()
            )));
        }

        if noise_len == 0 || self.config.reduction == 0.0 || input.is_empty() {
            log::debug!("Denoise skipped: empty noise segment or zero reduction");
            return Ok(input.clone());
        }

        let segment = &input.samples()[..noise_len];
        let level_db = relative_level_db(segment, input.samples());
        if level_db > self.config.max_profile_level_db {
            log::warn!(
                "Noise segment is only {:.1} dB below the clip and holds signal; denoise skipped",
                -level_db
            );
            return Ok(input.clone());
        }

        let profile = self.noise_profile(segment);

        let out = self.subtract(input.samples(), &profile);
        debug_assert_eq!(out.len(), input.len());

        Ok(input.with_samples(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    /// Deterministic uniform noise in [-amp, amp]
    fn noise(len: usize, amp: f32, seed: u32) -> Vec<f32> {
        let mut state = seed;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                let unit = (state >> 8) as f32 / (1u32 << 24) as f32;
                amp * (2.0 * unit - 1.0)
            })
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn test_length_and_rate_preserved() {
        let denoiser = Denoiser::new(DenoiseConfig::default()).unwrap();
        for len in [480usize, 1000, 1024, 19200, 40001] {
            let input = AudioBuffer::new(noise(len, 0.1, len as u32), 48000).unwrap();
            let out = denoiser.apply(&input).unwrap();
            assert_eq!(out.len(), len);
            assert_eq!(out.sample_rate(), 48000);
        }
    }

    #[test]
    fn test_silent_noise_segment_reconstructs_input() {
        let denoiser = Denoiser::new(DenoiseConfig::default()).unwrap();
        let mut samples = vec![0.0f32; 480];
        samples.extend(
            (0..9000).map(|i| 0.3 * (2.0 * PI * 440.0 * i as f32 / 48000.0).sin()),
        );
        let input = AudioBuffer::new(samples, 48000).unwrap();

        let out = denoiser.apply(&input).unwrap();
        for (a, b) in out.samples().iter().zip(input.samples()) {
            assert!((a - b).abs() < 1e-4, "{} vs {}", a, b);
        }
    }

    /// Stationary noise throughout, with a loud tone after `lead` samples
    fn noisy_tone(len: usize, lead: usize) -> Vec<f32> {
        noise(len, 0.05, 7)
            .into_iter()
            .enumerate()
            .map(|(i, n)| {
                let tone = if i < lead {
                    0.0
                } else {
                    0.8 * (2.0 * PI * 440.0 * i as f32 / 48000.0).sin()
                };
                n + tone
            })
            .collect()
    }

    #[test]
    fn test_stationary_noise_is_attenuated() {
        let config = DenoiseConfig::default().with_noise_profile(0.2);
        let denoiser = Denoiser::new(config).unwrap();
        let input = AudioBuffer::new(noisy_tone(48000, 12000), 48000).unwrap();

        let out = denoiser.apply(&input).unwrap();
        let before = rms(&input.samples()[2048..9000]);
        let after = rms(&out.samples()[2048..9000]);
        assert!(after < before * 0.6, "rms {} -> {}", before, after);

        let tone_before = rms(&input.samples()[20000..40000]);
        let tone_after = rms(&out.samples()[20000..40000]);
        assert!(tone_after > tone_before * 0.8, "tone rms {} -> {}", tone_before, tone_after);
    }

    #[test]
    fn test_signal_in_noise_segment_is_left_alone() {
        // Syllable starting at the first sample: the leading segment is its attack
        let denoiser = Denoiser::new(DenoiseConfig::default()).unwrap();
        let input = AudioBuffer::new(noisy_tone(19200, 0), 48000).unwrap();
        assert_eq!(denoiser.apply(&input).unwrap(), input);
    }

    #[test]
    fn test_zero_reduction_is_identity() {
        let denoiser = Denoiser::new(DenoiseConfig::default().with_reduction(0.0)).unwrap();
        let input = AudioBuffer::new(noise(5000, 0.2, 3), 16000).unwrap();
        assert_eq!(denoiser.apply(&input).unwrap(), input);
    }

    #[test]
    fn test_noise_segment_longer_than_clip() {
        let denoiser = Denoiser::new(DenoiseConfig::default().with_noise_profile(1.0)).unwrap();
        let input = AudioBuffer::new(noise(8000, 0.1, 1), 16000).unwrap();
        let err = denoiser.apply(&input).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_bad_hop_rejected() {
        let config = DenoiseConfig {
            hop_size: 1000,
            ..Default::default()
        };
        assert_eq!(Denoiser::new(config).unwrap_err().kind(), ErrorKind::Config);
    }

    #[test]
    fn test_reduction_outside_unit_range_rejected() {
        for reduction in [5.0f32, 1.01, -0.1, f32::NAN] {
            let err = Denoiser::new(DenoiseConfig::default().with_reduction(reduction)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Config, "reduction {}", reduction);
        }
        assert!(Denoiser::new(DenoiseConfig::default().with_reduction(0.8)).is_ok());
        assert!(Denoiser::new(DenoiseConfig::default().with_reduction(1.0)).is_ok());
    }
}
