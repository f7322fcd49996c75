//! Batch orchestration over directories of clips

pub mod config;
pub mod organizer;
pub mod runner;

pub use config::PipelineConfig;
pub use organizer::{list_wav_files, DirectoryOrganizer, REPORT_FILE_NAME};
pub use runner::BatchRunner;
