//! Stage trait definition

use crate::error::Result;
use crate::model::AudioBuffer;

/// One transformation in the processing chain
///
/// Implementations are immutable once built and shared read-only across
/// worker threads, so `apply` takes `&self` and returns a fresh buffer.
pub trait Stage: Send + Sync {
    /// Short lowercase name used in logs and reports
    fn name(&self) -> &'static str;

    /// Transform `input` into a new buffer
    fn apply(&self, input: &AudioBuffer) -> Result<AudioBuffer>;
}

impl<S: Stage + ?Sized> Stage for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn apply(&self, input: &AudioBuffer) -> Result<AudioBuffer> {
        (**self).apply(input)
    }
}
