//! Input enumeration and output placement

use crate::error::{Result, StimulusError};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Default file name of the JSON batch report
pub const REPORT_FILE_NAME: &str = "batch_report.json";

/// Maps a flat directory of WAV inputs to a flat output directory
#[derive(Debug, Clone)]
pub struct DirectoryOrganizer {
    input_dir: PathBuf,
    output_dir: PathBuf,
}

impl DirectoryOrganizer {
    pub fn new(input_dir: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            input_dir,
            output_dir,
        }
    }

    /// Check the input exists and create the output directory
    ///
    /// Writing into the input directory is refused: outputs keep their input
    /// file names and would replace the raw recordings.
    pub fn init(&self) -> Result<()> {
        if !self.input_dir.is_dir() {
            return Err(StimulusError::io(
                &self.input_dir,
                std::io::Error::new(std::io::ErrorKind::NotFound, "input directory not found"),
            ));
        }

        fs::create_dir_all(&self.output_dir)
            .map_err(|e| StimulusError::io(&self.output_dir, e))?;

        let input = fs::canonicalize(&self.input_dir)
            .map_err(|e| StimulusError::io(&self.input_dir, e))?;
        let output = fs::canonicalize(&self.output_dir)
            .map_err(|e| StimulusError::io(&self.output_dir, e))?;
        if input == output {
            return Err(StimulusError::Config(format!(
                "output directory {:?} must differ from the input directory",
                self.output_dir
            )));
        }

        log::debug!("Output directory ready at {:?}", self.output_dir);
        Ok(())
    }

    /// WAV files directly inside the input directory, sorted by name
    pub fn input_files(&self) -> Result<Vec<PathBuf>> {
        list_wav_files(&self.input_dir)
    }

    /// Output path for an input file: same file name, output directory
    pub fn output_path(&self, input: &Path) -> PathBuf {
        let file_name = input.file_name().unwrap_or_else(|| input.as_os_str());
        self.output_dir.join(file_name)
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(REPORT_FILE_NAME)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

/// Regular `.wav` files (any case) directly inside `dir`, sorted by file name
pub fn list_wav_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true);
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
            StimulusError::io(path, std::io::Error::other(e.to_string()))
        })?;
        if entry.file_type().is_file() && is_wav(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
}

/// File name for logs and reports
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
