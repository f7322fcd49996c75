//! WAV decoding via symphonia
//!
//! Stereo input is downmixed by averaging the two channels. Averaging
//! lowers the level of uncorrelated content, so loudness measured after
//! loading can differ from a per-channel measurement of the source.

use crate::error::{Result, StimulusError};
use crate::model::AudioBuffer;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Highest channel count accepted by `load`
const MAX_CHANNELS: usize = 2;

/// Load a mono or stereo PCM file into a mono buffer
pub fn load(path: &Path) -> Result<AudioBuffer> {
    log::debug!("Decoding {:?}", path);

    let file = std::fs::File::open(path).map_err(|e| StimulusError::io(path, e))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| StimulusError::decode(path, format!("unrecognized container: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| StimulusError::decode(path, "no audio track found"))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| StimulusError::decode(path, "no sample rate in audio track"))?;

    if let Some(channels) = track.codec_params.channels {
        if channels.count() > MAX_CHANNELS {
            return Err(StimulusError::decode(
                path,
                format!("{} channels, only mono or stereo is supported", channels.count()),
            ));
        }
    }

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| StimulusError::decode(path, format!("unsupported codec: {}", e)))?;

    let mut mono: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => {
                return Err(StimulusError::decode(
                    path,
                    format!("error reading packet: {}", e),
                ));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping corrupt packet in {:?}: {}", path, e);
                continue;
            }
            Err(e) => {
                return Err(StimulusError::decode(path, format!("decoder failed: {}", e)));
            }
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count();
        if channels > MAX_CHANNELS {
            return Err(StimulusError::decode(
                path,
                format!("{} channels, only mono or stereo is supported", channels),
            ));
        }

        let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        let samples = sample_buf.samples();

        if channels > 1 {
            for frame in samples.chunks(channels) {
                mono.push(frame.iter().sum::<f32>() / channels as f32);
            }
        } else {
            mono.extend_from_slice(samples);
        }
    }

    if mono.is_empty() {
        return Err(StimulusError::decode(path, "file contains no samples"));
    }

    log::debug!(
        "Decoded {} samples ({:.3}s) at {}Hz",
        mono.len(),
        mono.len() as f64 / sample_rate as f64,
        sample_rate
    );

    AudioBuffer::new(mono, sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use hound::{SampleFormat, WavSpec, WavWriter};

    fn write_wav(path: &Path, channels: u16, frames: &[Vec<i16>]) {
        let spec = WavSpec {
            channels,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for frame in frames {
            for &s in frame {
                writer.write_sample(s).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load(Path::new("/nonexistent/clip.wav")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("garbage.wav");
        std::fs::write(&path, b"definitely not a riff header").unwrap();

        let err = load(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn test_stereo_is_averaged() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("stereo.wav");
        let frames: Vec<Vec<i16>> = (0..1600).map(|_| vec![16384, 0]).collect();
        write_wav(&path, 2, &frames);

        let buffer = load(&path).unwrap();
        assert_eq!(buffer.sample_rate(), 16000);
        assert_eq!(buffer.len(), 1600);
        assert!(buffer.samples().iter().all(|&s| (s - 0.25).abs() < 1e-3));
    }

    #[test]
    fn test_multichannel_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("surround.wav");
        let frames: Vec<Vec<i16>> = (0..160).map(|_| vec![0, 0, 0, 0]).collect();
        write_wav(&path, 4, &frames);

        let err = load(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }
}
