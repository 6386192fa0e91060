//! Class-label manifest builder for image training datasets.
//!
//! A dataset root is a directory whose immediate subdirectories name the
//! classes; files nested below a subdirectory belong to that class. This
//! crate walks such a tree and produces a `dataset.json` manifest mapping
//! each file's relative path to an integer class index, in the shape the
//! downstream dataset loader consumes:
//!
//! ```json
//! {"labels": [["cat/a.jpg", 0], ["dog/b.jpg", 1]]}
//! ```
//!
//! # Types
//!
//! - [`ClassVocabulary`] - Stable name-to-index mapping from subdirectory names
//! - [`LabelManifest`] / [`LabelEntry`] - The manifest document and its records
//! - [`build_manifest`] / [`write_manifest`] - Walk a tree, optionally write
//! - [`BuildSummary`] - Counters for labeled and skipped files
//!
//! # Determinism
//!
//! Class indices follow lexicographic order of the subdirectory names, and
//! the walk visits entries in sorted order, so rebuilding the same tree
//! always yields an identical manifest.
//!
//! # Example
//!
//! ```
//! use ml_manifest::ClassVocabulary;
//!
//! let vocab = ClassVocabulary::from_names(["dog", "cat"]);
//! assert_eq!(vocab.index_of("cat"), Some(0));
//! assert_eq!(vocab.index_of("dog"), Some(1));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod builder;
mod error;
mod manifest;
mod vocabulary;

pub use builder::{BuildSummary, ManifestBuild, build_manifest, write_manifest};
pub use error::{ManifestError, Result};
pub use manifest::{LabelEntry, LabelManifest, MANIFEST_FILE};
pub use vocabulary::ClassVocabulary;

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::{
        BuildSummary, ClassVocabulary, LabelEntry, LabelManifest, MANIFEST_FILE, ManifestBuild,
        ManifestError, build_manifest, write_manifest,
    };
}
