use crate::error::{Result, StimulusError};

/// One mono audio clip held in memory
///
/// Stages never mutate a buffer in place; each produces a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Create a buffer, rejecting a zero sample rate
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(StimulusError::Config(
                "sample rate must be positive".to_string(),
            ));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Largest absolute amplitude (0.0 for an empty buffer)
    pub fn peak(&self) -> f32 {
        self.samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
    }

    /// Number of samples covering `seconds` at this buffer's rate, rounded
    pub fn samples_for(&self, seconds: f64) -> usize {
        seconds_to_samples(seconds, self.sample_rate)
    }

    /// Same sample rate, new samples
    pub fn with_samples(&self, samples: Vec<f32>) -> Self {
        Self {
            samples,
            sample_rate: self.sample_rate,
        }
    }

    /// Fail with `Clipping` when any sample lies outside [-1.0, 1.0]
    pub fn ensure_in_range(&self) -> Result<()> {
        let peak = self.peak();
        if peak > 1.0 || peak.is_nan() {
            return Err(StimulusError::Clipping { peak });
        }
        Ok(())
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

pub(crate) fn seconds_to_samples(seconds: f64, sample_rate: u32) -> usize {
    (seconds * sample_rate as f64).round().max(0.0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_rate_rejected() {
        let err = AudioBuffer::new(vec![0.0; 4], 0).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }

    #[test]
    fn test_samples_for_is_exact() {
        let buffer = AudioBuffer::new(Vec::new(), 48000).unwrap();
        assert_eq!(buffer.samples_for(0.4), 19200);

        let buffer = AudioBuffer::new(Vec::new(), 44100).unwrap();
        assert_eq!(buffer.samples_for(0.4), 17640);
    }

    #[test]
    fn test_range_check() {
        let ok = AudioBuffer::new(vec![0.5, -1.0, 1.0], 8000).unwrap();
        assert!(ok.ensure_in_range().is_ok());

        let hot = AudioBuffer::new(vec![0.5, -1.2], 8000).unwrap();
        assert!(matches!(
            hot.ensure_in_range(),
            Err(StimulusError::Clipping { .. })
        ));
    }
}
