//! Tensor backend identification for capability negotiation.

use serde::{Deserialize, Serialize};

/// ndarray series the custom double-backward path is validated against.
pub const SUPPORTED_NDARRAY_PREFIXES: &[&str] = &["0.15.", "0.16."];

/// ndarray series bundled with this workspace. Kept in sync with the
/// workspace dependency pin.
pub const BUNDLED_NDARRAY_VERSION: &str = "0.16.1";

/// Tensor backend families a training pipeline may run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BackendKind {
    /// CPU backend using ndarray. Always available.
    #[default]
    NdArray,

    /// GPU backend using WGPU.
    Wgpu,

    /// `LibTorch` backend (requires a libtorch installation).
    LibTorch,
}

impl BackendKind {
    /// Returns `true` if this is a CPU backend.
    #[must_use]
    pub const fn is_cpu(&self) -> bool {
        matches!(self, Self::NdArray)
    }

    /// Returns the backend name as a string.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NdArray => "ndarray",
            Self::Wgpu => "wgpu",
            Self::LibTorch => "libtorch",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Identity and version of the tensor backend in play.
///
/// Negotiated once at pipeline startup; the sampler uses it to decide
/// whether the custom differentiable path is safe to enable.
///
/// # Example
///
/// ```
/// use ml_resample::{BackendInfo, BackendKind};
///
/// let backend = BackendInfo::new(BackendKind::NdArray, "0.16.1");
/// assert!(backend.supports_custom_gradfix());
///
/// let backend = BackendInfo::new(BackendKind::NdArray, "0.13.0");
/// assert!(!backend.supports_custom_gradfix());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendInfo {
    /// Backend family.
    pub kind: BackendKind,

    /// Backend version string, e.g. `"0.16.1"`.
    pub version: String,
}

impl BackendInfo {
    /// Creates a backend description.
    #[must_use]
    pub fn new(kind: BackendKind, version: impl Into<String>) -> Self {
        Self {
            kind,
            version: version.into(),
        }
    }

    /// The ndarray backend this crate's kernels run on.
    #[must_use]
    pub fn ndarray() -> Self {
        Self::new(BackendKind::NdArray, BUNDLED_NDARRAY_VERSION)
    }

    /// Checks whether the custom double-backward sampling path is
    /// validated for this backend.
    #[must_use]
    pub fn supports_custom_gradfix(&self) -> bool {
        self.kind == BackendKind::NdArray
            && SUPPORTED_NDARRAY_PREFIXES
                .iter()
                .any(|prefix| self.version.starts_with(prefix))
    }
}

impl Default for BackendInfo {
    fn default() -> Self {
        Self::ndarray()
    }
}

impl std::fmt::Display for BackendInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_backend_is_supported() {
        let backend = BackendInfo::default();
        assert_eq!(backend.kind, BackendKind::NdArray);
        assert!(backend.supports_custom_gradfix());
    }

    #[test]
    fn old_ndarray_series_is_unsupported() {
        let backend = BackendInfo::new(BackendKind::NdArray, "0.13.1");
        assert!(!backend.supports_custom_gradfix());
    }

    #[test]
    fn non_cpu_backends_are_unsupported() {
        let backend = BackendInfo::new(BackendKind::Wgpu, "0.16.1");
        assert!(!backend.supports_custom_gradfix());
        assert!(!BackendKind::Wgpu.is_cpu());
    }

    #[test]
    fn prefix_match_is_not_substring_match() {
        // "10.15." must not pass because it merely contains "0.15.".
        let backend = BackendInfo::new(BackendKind::NdArray, "10.15.0");
        assert!(!backend.supports_custom_gradfix());
    }

    #[test]
    fn display_formats_kind_and_version() {
        let backend = BackendInfo::new(BackendKind::LibTorch, "2.3.0");
        assert_eq!(backend.to_string(), "libtorch 2.3.0");
    }

    #[test]
    fn bundled_version_is_reachable_and_supported() {
        // Goes through the crate root on purpose: these constants are part
        // of the public surface.
        assert!(crate::SUPPORTED_NDARRAY_PREFIXES
            .iter()
            .any(|prefix| crate::BUNDLED_NDARRAY_VERSION.starts_with(prefix)));
    }
}
