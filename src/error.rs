//! Error types shared by every stage and the batch runner

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while preparing stimuli
#[derive(Debug, Error)]
pub enum StimulusError {
    /// Input could not be decoded as mono/stereo PCM audio
    #[error("failed to decode {path:?}: {message}")]
    Decode { path: PathBuf, message: String },

    /// Samples would leave the representable [-1.0, 1.0] range
    #[error("peak amplitude {peak:.4} exceeds full scale")]
    Clipping { peak: f32 },

    /// A parameter violates a physical constraint (Nyquist, segment length, ...)
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Integrated loudness could not be measured
    #[error("loudness measurement failed: {0}")]
    Measurement(String),

    /// Filename does not follow the consonant + vowel pattern
    #[error("unrecognized filename format: {0}")]
    UnrecognizedFormat(String),

    /// Two inputs map to the same canonical filename
    #[error("{source_name} maps to {target}, already produced by another file")]
    NameCollision { source_name: String, target: String },

    /// Read or write failure
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Coarse error category, used in batch reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Decode,
    Clipping,
    Config,
    Measurement,
    UnrecognizedFormat,
    NameCollision,
    Io,
}

impl StimulusError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StimulusError::Decode { .. } => ErrorKind::Decode,
            StimulusError::Clipping { .. } => ErrorKind::Clipping,
            StimulusError::Config(_) => ErrorKind::Config,
            StimulusError::Measurement(_) => ErrorKind::Measurement,
            StimulusError::UnrecognizedFormat(_) => ErrorKind::UnrecognizedFormat,
            StimulusError::NameCollision { .. } => ErrorKind::NameCollision,
            StimulusError::Io { .. } => ErrorKind::Io,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StimulusError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn decode(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        StimulusError::Decode {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StimulusError>;
