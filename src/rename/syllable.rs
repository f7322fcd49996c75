//! Consonant + vowel filename parsing

use crate::error::{Result, StimulusError};
use std::path::Path;

/// Stimulus class for each recorded consonant
const CONSONANT_PREFIXES: &[(char, &str)] = &[
    ('b', "A1"),
    ('d', "A2"),
    ('g', "A3"),
    ('p', "B1"),
    ('t', "B2"),
    ('k', "B3"),
];

/// Spellings used during recording, mapped to the canonical vowel
const VOWEL_SPELLINGS: &[(&str, &str)] = &[
    ("e", "e"),
    ("eh", "e"),
    ("i", "i"),
    ("ie", "i"),
    ("u", "u"),
    ("uh", "u"),
    ("o", "o"),
    ("oh", "o"),
];

/// A parsed syllable recording name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Syllable {
    pub consonant: char,
    pub prefix: &'static str,
    pub vowel: &'static str,
}

impl Syllable {
    /// Parse a file stem such as `be` or `tuh`
    pub fn parse(stem: &str) -> Option<Self> {
        let stem = stem.to_ascii_lowercase();
        let mut chars = stem.chars();
        let consonant = chars.next()?;
        let rest = chars.as_str();

        let prefix = CONSONANT_PREFIXES
            .iter()
            .find(|(c, _)| *c == consonant)
            .map(|(_, p)| *p)?;
        let vowel = VOWEL_SPELLINGS
            .iter()
            .find(|(spelling, _)| *spelling == rest)
            .map(|(_, v)| *v)?;

        Some(Self {
            consonant,
            prefix,
            vowel,
        })
    }

    /// `{prefix}_{vowel}_{consonant}`
    pub fn canonical_stem(&self) -> String {
        format!("{}_{}_{}", self.prefix, self.vowel, self.consonant)
    }
}

/// Canonical name for a recording, e.g. `be.wav` → `A1_e_b.wav`
///
/// The extension is carried over unchanged.
pub fn canonical_name(file_name: &str) -> Result<String> {
    let path = Path::new(file_name);
    let unrecognized = || StimulusError::UnrecognizedFormat(file_name.to_string());

    let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(unrecognized)?;
    let syllable = Syllable::parse(stem).ok_or_else(unrecognized)?;

    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => Ok(format!("{}.{}", syllable.canonical_stem(), ext)),
        None => Ok(syllable.canonical_stem()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_known_names() {
        assert_eq!(canonical_name("be.wav").unwrap(), "A1_e_b.wav");
        assert_eq!(canonical_name("deh.wav").unwrap(), "A2_e_d.wav");
        assert_eq!(canonical_name("gie.wav").unwrap(), "A3_i_g.wav");
        assert_eq!(canonical_name("puh.wav").unwrap(), "B1_u_p.wav");
        assert_eq!(canonical_name("to.wav").unwrap(), "B2_o_t.wav");
        assert_eq!(canonical_name("koh.wav").unwrap(), "B3_o_k.wav");
    }

    #[test]
    fn test_extension_case_kept() {
        assert_eq!(canonical_name("Bi.WAV").unwrap(), "A1_i_b.WAV");
    }

    #[test]
    fn test_unrecognized_names() {
        for name in ["xyz123.wav", "b.wav", "ba.wav", "ze.wav", "beee.wav", ".wav", ""] {
            let err = canonical_name(name).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnrecognizedFormat, "{}", name);
        }
    }

    #[test]
    fn test_parse_fields() {
        let syllable = Syllable::parse("kuh").unwrap();
        assert_eq!(syllable.consonant, 'k');
        assert_eq!(syllable.prefix, "B3");
        assert_eq!(syllable.vowel, "u");
        assert_eq!(syllable.canonical_stem(), "B3_u_k");
    }
}
