//! Copying processed clips to their canonical names

use super::syllable::canonical_name;
use crate::batch::list_wav_files;
use crate::batch::organizer::display_name;
use crate::error::{Result, StimulusError};
use crate::model::FileFailure;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// One copied file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenamedFile {
    pub source: String,
    pub target: String,
}

/// Outcome of a rename run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenameReport {
    pub renamed: Vec<RenamedFile>,
    /// Unrecognised names and collisions, left uncopied
    pub skipped: Vec<FileFailure>,
}

impl RenameReport {
    pub fn log_summary(&self) {
        log::info!(
            "Renamed {} file(s), skipped {}",
            self.renamed.len(),
            self.skipped.len()
        );
        for skip in &self.skipped {
            log::warn!("  {} ({:?}): {}", skip.file_name, skip.kind, skip.message);
        }
    }
}

/// Copy every recognised WAV file of `input_dir` into `output_dir` under
/// its canonical name
///
/// Files are visited in sorted order; when two inputs map to the same
/// canonical name the first one wins and the other is reported.
pub fn rename_directory(input_dir: &Path, output_dir: &Path) -> Result<RenameReport> {
    fs::create_dir_all(output_dir).map_err(|e| StimulusError::io(output_dir, e))?;

    let mut report = RenameReport::default();
    let mut claimed: HashMap<String, String> = HashMap::new();

    for input in list_wav_files(input_dir)? {
        let name = display_name(&input);
        let target = match canonical_name(&name) {
            Ok(target) => target,
            Err(e) => {
                log::warn!("Skipping {}: {}", name, e);
                report.skipped.push(FileFailure::new(name, &e));
                continue;
            }
        };

        if let Some(first) = claimed.get(&target) {
            let e = StimulusError::NameCollision {
                source_name: name.clone(),
                target: target.clone(),
            };
            log::warn!("Skipping {}: {} already claimed by {}", name, target, first);
            report.skipped.push(FileFailure::new(name, &e));
            continue;
        }

        let dest: PathBuf = output_dir.join(&target);
        fs::copy(&input, &dest).map_err(|e| StimulusError::io(&dest, e))?;
        log::info!("Copied '{}' -> '{}'", name, target);

        claimed.insert(target.clone(), name.clone());
        report.renamed.push(RenamedFile {
            source: name,
            target,
        });
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn test_copies_and_reports() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        for name in ["be.wav", "beh.wav", "tuh.wav", "xyz123.wav", "notes.txt"] {
            fs::write(input.path().join(name), name.as_bytes()).unwrap();
        }

        let report = rename_directory(input.path(), output.path()).unwrap();

        let targets: Vec<&str> = report.renamed.iter().map(|r| r.target.as_str()).collect();
        assert_eq!(targets, vec!["A1_e_b.wav", "B2_u_t.wav"]);
        assert_eq!(
            fs::read(output.path().join("A1_e_b.wav")).unwrap(),
            b"be.wav".to_vec()
        );

        let kinds: Vec<(String, ErrorKind)> = report
            .skipped
            .iter()
            .map(|s| (s.file_name.clone(), s.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("beh.wav".to_string(), ErrorKind::NameCollision),
                ("xyz123.wav".to_string(), ErrorKind::UnrecognizedFormat),
            ]
        );
        assert!(input.path().join("be.wav").exists());
    }

    #[test]
    fn test_missing_input_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = rename_directory(&dir.path().join("missing"), &dir.path().join("out"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
