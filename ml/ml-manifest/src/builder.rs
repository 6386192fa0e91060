//! Directory walk that turns a class-per-subdirectory tree into a manifest.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ManifestError, Result};
use crate::manifest::{LabelEntry, LabelManifest};
use crate::vocabulary::ClassVocabulary;

/// Counters describing one manifest build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BuildSummary {
    /// Files that received a label entry.
    pub files_labeled: usize,

    /// Hidden files (name starting with `.`) that were skipped.
    pub dotted_skipped: usize,

    /// Files with no class subdirectory (directly in the root) that were
    /// skipped.
    pub stray_skipped: usize,
}

impl BuildSummary {
    /// Returns the total number of files visited by the walk.
    #[must_use]
    pub const fn files_visited(&self) -> usize {
        self.files_labeled + self.dotted_skipped + self.stray_skipped
    }
}

/// Result of building a manifest from a dataset root.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestBuild {
    /// The built manifest.
    pub manifest: LabelManifest,

    /// The class vocabulary the labels refer to.
    pub vocabulary: ClassVocabulary,

    /// Walk statistics.
    pub summary: BuildSummary,
}

/// Builds a label manifest from a class-per-subdirectory tree.
///
/// The immediate subdirectories of `root` define the class vocabulary (see
/// [`ClassVocabulary::scan`]); every file below a class directory receives
/// one entry pairing its `/`-separated relative path with the class index.
/// Hidden files and directories are skipped. Files directly in the root have
/// no class; they are skipped with a warning and counted in the summary.
///
/// Directory entries are visited in sorted order at every level, so the
/// entry order is deterministic across filesystems.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use ml_manifest::build_manifest;
///
/// let build = build_manifest(Path::new("./input/")).unwrap();
/// for (name, index) in build.vocabulary.iter() {
///     println!("{name} -> {index}");
/// }
/// ```
///
/// # Errors
///
/// Returns [`ManifestError::NotADirectory`] if `root` is not an existing
/// directory, [`ManifestError::NonUtf8Path`] for paths the UTF-8 manifest
/// cannot represent, or an IO error if the walk fails.
pub fn build_manifest(root: &Path) -> Result<ManifestBuild> {
    let vocabulary = ClassVocabulary::scan(root)?;

    let mut manifest = LabelManifest::new();
    let mut summary = BuildSummary::default();
    walk(root, root, &vocabulary, &mut manifest, &mut summary)?;

    Ok(ManifestBuild {
        manifest,
        vocabulary,
        summary,
    })
}

/// Builds a manifest and writes it as `dataset.json` inside the root,
/// overwriting any existing file.
///
/// # Errors
///
/// Same conditions as [`build_manifest`], plus write failures.
pub fn write_manifest(root: &Path) -> Result<ManifestBuild> {
    let build = build_manifest(root)?;
    build.manifest.write_to(root)?;
    Ok(build)
}

fn walk(
    dir: &Path,
    root: &Path,
    vocabulary: &ClassVocabulary,
    manifest: &mut LabelManifest,
    summary: &mut BuildSummary,
) -> Result<()> {
    let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<std::io::Result<_>>()?;
    entries.sort_by_key(std::fs::DirEntry::file_name);

    for entry in entries {
        let raw = entry.file_name();
        let Some(name) = raw.to_str() else {
            return Err(ManifestError::non_utf8_path(entry.path()));
        };

        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if !name.starts_with('.') {
                walk(&entry.path(), root, vocabulary, manifest, summary)?;
            }
            continue;
        }

        if name.starts_with('.') {
            summary.dotted_skipped += 1;
            continue;
        }

        let path = entry.path();
        let relative = relative_path(&path, root)?;
        // A file directly in the root has no class component.
        let class = relative
            .split_once('/')
            .and_then(|(first, _)| vocabulary.index_of(first));

        match class {
            Some(index) => {
                manifest.push(LabelEntry::new(relative, index));
                summary.files_labeled += 1;
            }
            None => {
                warn!(path = %path.display(), "file has no class subdirectory, skipping");
                summary.stray_skipped += 1;
            }
        }
    }

    Ok(())
}

/// Strips the root prefix and joins the remaining components with `/`.
fn relative_path(path: &Path, root: &Path) -> Result<String> {
    let stripped = path
        .strip_prefix(root)
        .map_err(|_| ManifestError::validation(format!("{} escapes the root", path.display())))?;

    let mut out = String::new();
    for component in stripped.components() {
        let Some(part) = component.as_os_str().to_str() else {
            return Err(ManifestError::non_utf8_path(path));
        };
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(part);
    }
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Builds a two-class tree with one hidden file:
    /// `cat/{a.jpg, .DS_Store}` and `dog/b.jpg`.
    fn scenario_tree() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("cat")).unwrap();
        fs::create_dir(dir.path().join("dog")).unwrap();
        fs::write(dir.path().join("cat/a.jpg"), b"img").unwrap();
        fs::write(dir.path().join("cat/.DS_Store"), b"junk").unwrap();
        fs::write(dir.path().join("dog/b.jpg"), b"img").unwrap();
        dir
    }

    #[test]
    fn scenario_manifest_matches_expected_shape() {
        let dir = scenario_tree();
        let build = build_manifest(dir.path()).unwrap();

        let json = build.manifest.to_json().unwrap();
        assert_eq!(json, r#"{"labels":[["cat/a.jpg",0],["dog/b.jpg",1]]}"#);

        assert_eq!(build.summary.files_labeled, 2);
        assert_eq!(build.summary.dotted_skipped, 1);
        assert_eq!(build.summary.stray_skipped, 0);
    }

    #[test]
    fn one_record_per_visible_file() {
        let dir = scenario_tree();
        fs::create_dir(dir.path().join("cat/kittens")).unwrap();
        fs::write(dir.path().join("cat/kittens/c.jpg"), b"img").unwrap();

        let build = build_manifest(dir.path()).unwrap();
        assert_eq!(build.manifest.len(), 3);

        // Nested files take their top-level directory's class.
        let nested = build
            .manifest
            .labels
            .iter()
            .find(|e| e.path() == "cat/kittens/c.jpg")
            .unwrap();
        assert_eq!(nested.class_index(), 0);
    }

    #[test]
    fn recorded_paths_resolve_to_files() {
        let dir = scenario_tree();
        let build = build_manifest(dir.path()).unwrap();

        for entry in &build.manifest.labels {
            let joined: PathBuf = dir.path().join(entry.path());
            assert!(joined.is_file(), "{} does not resolve", entry.path());
        }
    }

    #[test]
    fn class_indices_are_dense_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["wolf", "bear", "fox"] {
            fs::create_dir(dir.path().join(name)).unwrap();
            fs::write(dir.path().join(name).join("x.png"), b"img").unwrap();
        }

        let build = build_manifest(dir.path()).unwrap();
        assert_eq!(build.vocabulary.names(), ["bear", "fox", "wolf"]);
        build.manifest.validate(&build.vocabulary).unwrap();
    }

    #[test]
    fn stray_root_file_is_skipped_and_counted() {
        let dir = scenario_tree();
        fs::write(dir.path().join("notes.txt"), b"stray").unwrap();

        let build = build_manifest(dir.path()).unwrap();
        assert_eq!(build.summary.stray_skipped, 1);
        assert_eq!(build.manifest.len(), 2);
        assert!(build.manifest.labels.iter().all(|e| e.path() != "notes.txt"));
    }

    #[test]
    fn missing_root_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("input");

        let err = write_manifest(&missing).unwrap_err();
        assert!(matches!(err, ManifestError::NotADirectory(_)));
        assert!(!missing.join("dataset.json").exists());
    }

    #[test]
    fn write_manifest_emits_dataset_json() {
        let dir = scenario_tree();
        let build = write_manifest(dir.path()).unwrap();

        let loaded = LabelManifest::load_from(dir.path()).unwrap();
        assert_eq!(loaded, build.manifest);
    }

    #[test]
    fn rebuild_skips_previous_manifest_file() {
        let dir = scenario_tree();
        write_manifest(dir.path()).unwrap();

        // dataset.json now sits in the root; a rebuild must not label it.
        let build = write_manifest(dir.path()).unwrap();
        assert_eq!(build.manifest.len(), 2);
        assert_eq!(build.summary.stray_skipped, 1);
    }

    #[test]
    fn hidden_directories_are_not_walked() {
        let dir = scenario_tree();
        fs::create_dir(dir.path().join("cat/.thumbnails")).unwrap();
        fs::write(dir.path().join("cat/.thumbnails/t.jpg"), b"img").unwrap();

        let build = build_manifest(dir.path()).unwrap();
        assert_eq!(build.manifest.len(), 2);
    }

    #[test]
    fn empty_root_yields_empty_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let build = build_manifest(dir.path()).unwrap();
        assert!(build.manifest.is_empty());
        assert!(build.vocabulary.is_empty());
        assert_eq!(build.summary.files_visited(), 0);
    }
}
