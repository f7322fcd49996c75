//! Audio file I/O
//!
//! Decoding goes through symphonia, encoding through hound. Both speak
//! in terms of `AudioBuffer`.

mod decode;
mod encode;

pub use decode::load;
pub use encode::{save, SampleEncoding};
