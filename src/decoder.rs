//! Label decoder artifact.
//!
//! An opaque mapping from category index to label, produced during training
//! and loaded once at startup. Both extractors are constructed with a handle
//! to it; nothing in the inference path reads it.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::LoadError;

#[derive(Debug, Clone)]
pub struct Decoder {
    labels: BTreeMap<u32, String>,
}

impl Decoder {
    /// Load the decoder from its JSON artifact. Missing or malformed
    /// artifacts are startup-fatal.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| LoadError::Decoder {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let labels: BTreeMap<u32, String> =
            serde_json::from_str(&content).map_err(|e| LoadError::Decoder {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        Ok(Self { labels })
    }

    pub fn label(&self, index: u32) -> Option<&str> {
        self.labels.get(&index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;

    pub fn empty() -> Decoder {
        Decoder {
            labels: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"0": "chair", "1": "bicycle", "7": "sofa"}}"#).unwrap();

        let decoder = Decoder::load(file.path()).unwrap();
        assert_eq!(decoder.len(), 3);
        assert_eq!(decoder.label(1), Some("bicycle"));
        assert_eq!(decoder.label(2), None);
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let err = Decoder::load(Path::new("/nonexistent/decoder.json")).unwrap_err();
        assert!(matches!(err, LoadError::Decoder { .. }));
    }

    #[test]
    fn test_malformed_json_is_load_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = Decoder::load(file.path()).unwrap_err();
        assert!(matches!(err, LoadError::Decoder { .. }));
    }
}
