//! Class vocabulary derived from dataset subdirectory names.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ManifestError, Result};

/// Ordered mapping from class name to integer class index.
///
/// The vocabulary is derived from the immediate subdirectories of a dataset
/// root. Names are sorted lexicographically before index assignment, so the
/// name-to-index mapping is stable across filesystems and runs. Hidden
/// directories (names starting with `.`) are excluded.
///
/// # Example
///
/// ```
/// use ml_manifest::ClassVocabulary;
///
/// let vocab = ClassVocabulary::from_names(["dog", "cat"]);
/// assert_eq!(vocab.index_of("cat"), Some(0));
/// assert_eq!(vocab.index_of("dog"), Some(1));
/// assert_eq!(vocab.name(1), Some("dog"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ClassVocabulary {
    names: Vec<String>,
}

impl ClassVocabulary {
    /// Builds a vocabulary from the immediate subdirectories of `root`.
    ///
    /// The root is enumerated exactly once; each non-hidden subdirectory
    /// name becomes a class, indexed in lexicographic order.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::NotADirectory`] if `root` is not an existing
    /// directory, [`ManifestError::NonUtf8Path`] if a subdirectory name is
    /// not valid UTF-8, [`ManifestError::Validation`] if the class count
    /// does not fit a `u32` index, or an IO error if enumeration fails.
    pub fn scan(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(ManifestError::not_a_directory(root));
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let raw = entry.file_name();
            let Some(name) = raw.to_str() else {
                return Err(ManifestError::non_utf8_path(entry.path()));
            };
            if name.starts_with('.') {
                continue;
            }
            names.push(name.to_string());
        }
        names.sort();

        if u32::try_from(names.len()).is_err() {
            return Err(ManifestError::validation(format!(
                "class count {} does not fit a u32 index",
                names.len()
            )));
        }

        Ok(Self { names })
    }

    /// Builds a vocabulary directly from class names.
    ///
    /// Names are sorted, so the resulting indices match what [`scan`] would
    /// produce for a tree with the same subdirectories. Class indices are
    /// `u32`; callers must keep the name count within `u32` range ([`scan`]
    /// enforces this for directory-derived vocabularies).
    ///
    /// [`scan`]: ClassVocabulary::scan
    #[must_use]
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        names.sort();
        Self { names }
    }

    /// Returns the class index for a name, if present.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<u32> {
        // Names are sorted at construction, and the count is bounded to u32
        // range there, so the conversion cannot fail.
        self.names
            .binary_search_by(|n| n.as_str().cmp(name))
            .ok()
            .and_then(|i| u32::try_from(i).ok())
    }

    /// Returns the class name for an index, if in range.
    #[must_use]
    pub fn name(&self, index: u32) -> Option<&str> {
        self.names.get(index as usize).map(String::as_str)
    }

    /// Returns the number of classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Checks if the vocabulary is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Returns the class names in index order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Iterates over `(name, index)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.names
            .iter()
            .enumerate()
            .filter_map(|(i, n)| Some((n.as_str(), u32::try_from(i).ok()?)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn indices_follow_sorted_order() {
        // Insertion order must not matter: the index is the position in the
        // lexicographically sorted name list.
        let vocab = ClassVocabulary::from_names(["zebra", "ant", "mole"]);
        assert_eq!(vocab.index_of("ant"), Some(0));
        assert_eq!(vocab.index_of("mole"), Some(1));
        assert_eq!(vocab.index_of("zebra"), Some(2));
    }

    #[test]
    fn dense_indices_zero_to_n() {
        let vocab = ClassVocabulary::from_names(["c", "a", "b", "d"]);
        assert_eq!(vocab.len(), 4);
        for i in 0..4 {
            let name = vocab.name(i).unwrap();
            assert_eq!(vocab.index_of(name), Some(i));
        }
        assert_eq!(vocab.name(4), None);
    }

    #[test]
    fn unknown_name_has_no_index() {
        let vocab = ClassVocabulary::from_names(["cat", "dog"]);
        assert_eq!(vocab.index_of("bird"), None);
    }

    #[test]
    fn scan_reads_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("dog")).unwrap();
        fs::create_dir(dir.path().join("cat")).unwrap();
        fs::write(dir.path().join("stray.txt"), b"not a class").unwrap();

        let vocab = ClassVocabulary::scan(dir.path()).unwrap();
        assert_eq!(vocab.names(), ["cat", "dog"]);
        assert_eq!(vocab.index_of("cat"), Some(0));
        assert_eq!(vocab.index_of("dog"), Some(1));
    }

    #[test]
    fn scan_skips_hidden_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("cat")).unwrap();
        fs::create_dir(dir.path().join(".cache")).unwrap();

        let vocab = ClassVocabulary::scan(dir.path()).unwrap();
        assert_eq!(vocab.names(), ["cat"]);
    }

    #[test]
    fn scan_rejects_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = ClassVocabulary::scan(&missing).unwrap_err();
        assert!(matches!(err, ManifestError::NotADirectory(_)));
    }

    #[test]
    fn scan_rejects_file_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file.txt");
        fs::write(&file, b"x").unwrap();
        let err = ClassVocabulary::scan(&file).unwrap_err();
        assert!(matches!(err, ManifestError::NotADirectory(_)));
    }

    #[test]
    fn iter_yields_pairs_in_order() {
        let vocab = ClassVocabulary::from_names(["b", "a"]);
        let pairs: Vec<_> = vocab.iter().collect();
        assert_eq!(pairs, vec![("a", 0), ("b", 1)]);
    }

    #[test]
    fn empty_vocabulary() {
        let vocab = ClassVocabulary::default();
        assert!(vocab.is_empty());
        assert_eq!(vocab.len(), 0);
    }
}
