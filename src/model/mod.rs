//! In-memory data model
//!
//! `AudioBuffer` is the value every stage consumes and produces;
//! the report types describe what happened to each file of a batch.

mod buffer;
mod report;

pub use buffer::AudioBuffer;
pub(crate) use buffer::seconds_to_samples;
pub use report::{BatchResult, FileFailure, ProcessedFile};
