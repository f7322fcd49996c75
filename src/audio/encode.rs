//! WAV encoding via hound

use crate::error::{Result, StimulusError};
use crate::model::AudioBuffer;
use hound::{SampleFormat, WavSpec, WavWriter};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Sample format of written WAV files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleEncoding {
    /// 16-bit integer PCM
    #[default]
    Pcm16,
    /// 24-bit integer PCM
    Pcm24,
    /// 32-bit IEEE float
    Float32,
}

impl SampleEncoding {
    fn spec(self, sample_rate: u32) -> WavSpec {
        let (bits_per_sample, sample_format) = match self {
            SampleEncoding::Pcm16 => (16, SampleFormat::Int),
            SampleEncoding::Pcm24 => (24, SampleFormat::Int),
            SampleEncoding::Float32 => (32, SampleFormat::Float),
        };
        WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample,
            sample_format,
        }
    }
}

/// Write `buffer` as a mono WAV file, replacing any existing file
///
/// Fails with `Clipping` before touching the file system when a sample lies
/// outside [-1.0, 1.0].
pub fn save(buffer: &AudioBuffer, path: &Path, encoding: SampleEncoding) -> Result<()> {
    buffer.ensure_in_range()?;

    let mut writer = WavWriter::create(path, encoding.spec(buffer.sample_rate()))
        .map_err(|e| hound_error(path, e))?;

    match encoding {
        SampleEncoding::Pcm16 => {
            for &s in buffer.samples() {
                let value = (s * i16::MAX as f32).round() as i16;
                writer.write_sample(value).map_err(|e| hound_error(path, e))?;
            }
        }
        SampleEncoding::Pcm24 => {
            const PCM24_MAX: f32 = 8_388_607.0;
            for &s in buffer.samples() {
                let value = (s * PCM24_MAX).round() as i32;
                writer.write_sample(value).map_err(|e| hound_error(path, e))?;
            }
        }
        SampleEncoding::Float32 => {
            for &s in buffer.samples() {
                writer.write_sample(s).map_err(|e| hound_error(path, e))?;
            }
        }
    }

    writer.finalize().map_err(|e| hound_error(path, e))?;

    log::debug!(
        "Wrote {} samples at {}Hz to {:?}",
        buffer.len(),
        buffer.sample_rate(),
        path
    );
    Ok(())
}

fn hound_error(path: &Path, error: hound::Error) -> StimulusError {
    match error {
        hound::Error::IoError(e) => StimulusError::io(path, e),
        other => StimulusError::io(path, std::io::Error::other(other.to_string())),
    }
}
