//! Zero-phase Butterworth low-pass
//!
//! The filter is a cascade of bilinear-transformed biquads (plus one
//! first-order section for odd orders). It runs forward, then backward over
//! the reversed output, so phase shifts cancel and no sample moves in time.
//! Edges are handled like a classic filtfilt: odd reflection padding and
//! steady-state initial conditions for every section.

use super::traits::Stage;
use crate::error::{Result, StimulusError};
use crate::model::AudioBuffer;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const MAX_ORDER: usize = 32;

/// Smoother parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothConfig {
    pub filter_order: usize,
    pub cutoff_hz: f64,
}

impl Default for SmoothConfig {
    fn default() -> Self {
        Self {
            filter_order: 10,
            cutoff_hz: 8000.0,
        }
    }
}

impl SmoothConfig {
    pub fn with_order(mut self, order: usize) -> Self {
        self.filter_order = order;
        self
    }

    pub fn with_cutoff(mut self, hz: f64) -> Self {
        self.cutoff_hz = hz;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.filter_order == 0 || self.filter_order > MAX_ORDER {
            return Err(StimulusError::Config(format!(
                "filter order must lie in 1..={}, got {}",
                MAX_ORDER, self.filter_order
            )));
        }
        if !(self.cutoff_hz.is_finite() && self.cutoff_hz > 0.0) {
            return Err(StimulusError::Config(format!(
                "cutoff must be positive, got {}",
                self.cutoff_hz
            )));
        }
        Ok(())
    }
}

/// Direct form II transposed section, normalized so a0 = 1
#[derive(Debug, Clone, Copy)]
struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Biquad {
    /// Second-order low-pass from the analog prototype 1 / (s^2 + s/Q + 1)
    fn lowpass(k: f64, q: f64) -> Self {
        let k2 = k * k;
        let norm = 1.0 / (1.0 + k / q + k2);
        let b0 = k2 * norm;
        Self {
            b0,
            b1: 2.0 * b0,
            b2: b0,
            a1: 2.0 * (k2 - 1.0) * norm,
            a2: (1.0 - k / q + k2) * norm,
        }
    }

    /// First-order low-pass from 1 / (s + 1)
    fn lowpass_first_order(k: f64) -> Self {
        let norm = 1.0 / (1.0 + k);
        Self {
            b0: k * norm,
            b1: k * norm,
            b2: 0.0,
            a1: (k - 1.0) * norm,
            a2: 0.0,
        }
    }

    fn dc_gain(&self) -> f64 {
        (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2)
    }

    /// State that makes a constant input `x` produce a constant output
    fn steady_state(&self, x: f64) -> (f64, f64) {
        let y = self.dc_gain() * x;
        let z2 = self.b2 * x - self.a2 * y;
        let z1 = self.b1 * x - self.a1 * y + z2;
        (z1, z2)
    }

    fn run(&self, signal: &mut [f64], first_input: f64) {
        let (mut z1, mut z2) = self.steady_state(first_input);
        for s in signal.iter_mut() {
            let x = *s;
            let y = self.b0 * x + z1;
            z1 = self.b1 * x - self.a1 * y + z2;
            z2 = self.b2 * x - self.a2 * y;
            *s = y;
        }
    }
}

/// Butterworth low-pass as second-order sections
fn butterworth_lowpass(order: usize, cutoff_hz: f64, sample_rate: f64) -> Vec<Biquad> {
    // Pre-warped analog cutoff
    let k = (PI * cutoff_hz / sample_rate).tan();

    let mut sections: Vec<Biquad> = (0..order / 2)
        .map(|i| {
            let theta = PI * (2 * i + 1) as f64 / (2 * order) as f64;
            Biquad::lowpass(k, 1.0 / (2.0 * theta.cos()))
        })
        .collect();

    if order % 2 == 1 {
        sections.push(Biquad::lowpass_first_order(k));
    }
    sections
}

fn run_cascade(sections: &[Biquad], signal: &mut [f64]) {
    let Some(&first) = signal.first() else {
        return;
    };
    let mut x0 = first;
    for section in sections {
        section.run(signal, x0);
        x0 *= section.dc_gain();
    }
}

/// Forward-backward filtering with odd reflection padding
fn filtfilt(sections: &[Biquad], input: &[f32]) -> Vec<f32> {
    let len = input.len();
    if len == 0 {
        return Vec::new();
    }

    let pad = (3 * (2 * sections.len() + 1)).min(len - 1);
    let first = input[0] as f64;
    let last = input[len - 1] as f64;

    let mut ext = Vec::with_capacity(len + 2 * pad);
    ext.extend((1..=pad).rev().map(|i| 2.0 * first - input[i] as f64));
    ext.extend(input.iter().map(|&s| s as f64));
    ext.extend((1..=pad).map(|i| 2.0 * last - input[len - 1 - i] as f64));

    run_cascade(sections, &mut ext);
    ext.reverse();
    run_cascade(sections, &mut ext);
    ext.reverse();

    ext[pad..pad + len].iter().map(|&s| s as f32).collect()
}

/// Zero-phase low-pass stage
#[derive(Debug, Clone)]
pub struct SpectralSmoother {
    config: SmoothConfig,
}

impl SpectralSmoother {
    pub fn new(config: SmoothConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SmoothConfig {
        &self.config
    }
}

impl Stage for SpectralSmoother {
    fn name(&self) -> &'static str {
        "smooth"
    }

    fn apply(&self, input: &AudioBuffer) -> Result<AudioBuffer> {
        let nyquist = input.sample_rate() as f64 / 2.0;
        if self.config.cutoff_hz >= nyquist {
            return Err(StimulusError::Config(format!(
                "cutoff {}Hz is not below the Nyquist frequency {}Hz",
                self.config.cutoff_hz, nyquist
            )));
        }

        let sections = butterworth_lowpass(
            self.config.filter_order,
            self.config.cutoff_hz,
            input.sample_rate() as f64,
        );

        Ok(input.with_samples(filtfilt(&sections, input.samples())))
    }
}
