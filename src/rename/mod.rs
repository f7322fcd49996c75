//! Canonical stimulus names

mod directory;
mod syllable;

pub use directory::{rename_directory, RenameReport, RenamedFile};
pub use syllable::{canonical_name, Syllable};
