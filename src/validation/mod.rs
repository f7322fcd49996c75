//! Validation utilities
//!
//! Re-reads processed output and checks it against the pipeline's guarantees

mod verify;

pub use verify::{verify_output, Expectations, FileCheck, VerifyReport};
