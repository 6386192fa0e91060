//! Label manifest type and JSON (de)serialization.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ManifestError, Result};
use crate::vocabulary::ClassVocabulary;

/// File name of a label manifest inside its dataset root.
pub const MANIFEST_FILE: &str = "dataset.json";

/// One labeled file: relative path and class index.
///
/// Serializes as a two-element JSON array, `["cat/a.jpg", 0]`, which is the
/// shape the downstream dataset loader consumes. Paths always use `/`
/// separators regardless of platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEntry(pub String, pub u32);

impl LabelEntry {
    /// Creates a new label entry.
    #[must_use]
    pub fn new(path: impl Into<String>, class_index: u32) -> Self {
        Self(path.into(), class_index)
    }

    /// Returns the path relative to the dataset root.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.0
    }

    /// Returns the class index.
    #[must_use]
    pub const fn class_index(&self) -> u32 {
        self.1
    }
}

/// Label manifest mapping dataset files to class indices.
///
/// The serialized form is a single JSON object with one field:
/// `{"labels": [["cat/a.jpg", 0], ["dog/b.jpg", 1]]}`.
///
/// # Example
///
/// ```
/// use ml_manifest::{LabelEntry, LabelManifest};
///
/// let mut manifest = LabelManifest::new();
/// manifest.push(LabelEntry::new("cat/a.jpg", 0));
/// manifest.push(LabelEntry::new("dog/b.jpg", 1));
///
/// let json = manifest.to_json().unwrap();
/// assert_eq!(json, r#"{"labels":[["cat/a.jpg",0],["dog/b.jpg",1]]}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LabelManifest {
    /// Labeled files in the order they were visited.
    pub labels: Vec<LabelEntry>,
}

impl LabelManifest {
    /// Creates an empty manifest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a label entry.
    pub fn push(&mut self, entry: LabelEntry) {
        self.labels.push(entry);
    }

    /// Returns the number of labeled files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Checks if the manifest is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Checks every entry against a vocabulary.
    ///
    /// # Errors
    ///
    /// Returns a validation error if an entry's class index is out of range
    /// for the vocabulary, or if the first component of its path does not
    /// name the class the index points at.
    pub fn validate(&self, vocabulary: &ClassVocabulary) -> Result<()> {
        for entry in &self.labels {
            let Some(class_name) = vocabulary.name(entry.class_index()) else {
                return Err(ManifestError::validation(format!(
                    "class index {} out of range for {} classes ({})",
                    entry.class_index(),
                    vocabulary.len(),
                    entry.path(),
                )));
            };
            let first = entry.path().split('/').next().unwrap_or_default();
            if first != class_name {
                return Err(ManifestError::validation(format!(
                    "path {} does not belong to class {class_name} (index {})",
                    entry.path(),
                    entry.class_index(),
                )));
            }
        }
        Ok(())
    }

    /// Serializes the manifest to compact JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(ManifestError::from)
    }

    /// Deserializes a manifest from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not have the manifest shape.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(ManifestError::from)
    }

    /// Writes the manifest as `dataset.json` inside `dir`, overwriting any
    /// existing file. Returns the path written.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(MANIFEST_FILE);
        fs::write(&path, self.to_json()?)?;
        Ok(path)
    }

    /// Loads the `dataset.json` manifest from `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let json = fs::read_to_string(dir.join(MANIFEST_FILE))?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample_manifest() -> LabelManifest {
        let mut manifest = LabelManifest::new();
        manifest.push(LabelEntry::new("cat/a.jpg", 0));
        manifest.push(LabelEntry::new("dog/b.jpg", 1));
        manifest
    }

    #[test]
    fn entry_accessors() {
        let entry = LabelEntry::new("cat/a.jpg", 3);
        assert_eq!(entry.path(), "cat/a.jpg");
        assert_eq!(entry.class_index(), 3);
    }

    #[test]
    fn json_shape_is_labels_of_pairs() {
        let json = sample_manifest().to_json().unwrap();
        assert_eq!(json, r#"{"labels":[["cat/a.jpg",0],["dog/b.jpg",1]]}"#);
    }

    #[test]
    fn json_round_trip() {
        let manifest = sample_manifest();
        let parsed = LabelManifest::from_json(&manifest.to_json().unwrap()).unwrap();
        assert_eq!(parsed, manifest);
    }

    #[test]
    fn validate_accepts_consistent_manifest() {
        let vocab = ClassVocabulary::from_names(["cat", "dog"]);
        assert!(sample_manifest().validate(&vocab).is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range_index() {
        let vocab = ClassVocabulary::from_names(["cat"]);
        let mut manifest = LabelManifest::new();
        manifest.push(LabelEntry::new("cat/a.jpg", 7));
        assert!(manifest.validate(&vocab).is_err());
    }

    #[test]
    fn validate_rejects_mismatched_class() {
        let vocab = ClassVocabulary::from_names(["cat", "dog"]);
        let mut manifest = LabelManifest::new();
        manifest.push(LabelEntry::new("cat/a.jpg", 1)); // dog's index
        assert!(manifest.validate(&vocab).is_err());
    }

    #[test]
    fn write_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = sample_manifest();
        let path = manifest.write_to(dir.path()).unwrap();
        assert_eq!(path, dir.path().join(MANIFEST_FILE));

        let loaded = LabelManifest::load_from(dir.path()).unwrap();
        assert_eq!(loaded, manifest);
    }

    #[test]
    fn write_overwrites_existing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), b"old contents").unwrap();

        sample_manifest().write_to(dir.path()).unwrap();
        let loaded = LabelManifest::load_from(dir.path()).unwrap();
        assert_eq!(loaded.len(), 2);
    }
}
