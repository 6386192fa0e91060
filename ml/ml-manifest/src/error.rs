//! Error types for ml-manifest crate.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while building or loading label manifests.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The input root is not an existing directory.
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    /// A path could not be represented in the UTF-8 manifest.
    #[error("path is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),

    /// IO error.
    #[error("IO error: {0}")]
    Io(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Validation error.
    #[error("validation error: {0}")]
    Validation(String),
}

impl ManifestError {
    /// Creates a not-a-directory error.
    #[must_use]
    pub fn not_a_directory(path: impl Into<PathBuf>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Creates a non-UTF-8 path error.
    #[must_use]
    pub fn non_utf8_path(path: impl Into<PathBuf>) -> Self {
        Self::NonUtf8Path(path.into())
    }

    /// Creates an IO error.
    #[must_use]
    pub fn io(reason: impl Into<String>) -> Self {
        Self::Io(reason.into())
    }

    /// Creates a serialization error.
    #[must_use]
    pub fn serialization(reason: impl Into<String>) -> Self {
        Self::Serialization(reason.into())
    }

    /// Creates a validation error.
    #[must_use]
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }
}

impl From<std::io::Error> for ManifestError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ManifestError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for ml-manifest operations.
pub type Result<T> = std::result::Result<T, ManifestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_not_a_directory() {
        let err = ManifestError::not_a_directory("/no/such/place");
        assert!(err.to_string().contains("/no/such/place"));
    }

    #[test]
    fn error_non_utf8_path() {
        let err = ManifestError::non_utf8_path("/weird");
        assert!(err.to_string().contains("/weird"));
    }

    #[test]
    fn error_validation() {
        let err = ManifestError::validation("class index out of range");
        assert!(err.to_string().contains("class index out of range"));
    }

    #[test]
    fn error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "not found");
        let err: ManifestError = io_err.into();
        assert!(matches!(err, ManifestError::Io(_)));
    }

    #[test]
    fn error_from_serde_error() {
        let json_err = serde_json::from_str::<i32>("oops").unwrap_err();
        let err: ManifestError = json_err.into();
        assert!(matches!(err, ManifestError::Serialization(_)));
    }
}
