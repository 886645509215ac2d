//! The set of files reachable through import directives.
//!
//! Every discovered file gets one [`DependencyEntry`], keyed by its canonical
//! path. The key is what makes cyclic and diamond-shaped import graphs
//! terminate: a file already present is never visited again.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::constants::{DEPENDENCY_FILE_PREFIX, SCRATCH_HASH_BYTES};
use crate::utils::fs::file_name_str;

/// One imported file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEntry {
    /// Canonical path of the file.
    pub source_path: PathBuf,
    /// File name inside the scratch directory.
    pub scratch_filename: String,
    /// Import path as written in the directive that first reached the file.
    pub original_import_path: String,
}

/// Scratch file name for a dependency: `imported_<hash>_<basename>`.
///
/// The hash covers the full path, so two `Styles.typ` in different
/// directories never collide, and the same file always gets the same name.
///
/// ```
/// use std::path::Path;
/// use typst_prep::resolver::scratch_filename;
///
/// let name = scratch_filename(Path::new("/srv/app/resources/typst/Styles.typ"));
/// assert!(name.starts_with("imported_"));
/// assert!(name.ends_with("_Styles.typ"));
/// ```
#[must_use]
pub fn scratch_filename(source_path: &Path) -> String {
    let digest = Sha256::digest(source_path.to_string_lossy().as_bytes());
    format!(
        "{}{}_{}",
        DEPENDENCY_FILE_PREFIX,
        hex::encode(&digest[..SCRATCH_HASH_BYTES]),
        file_name_str(source_path)
    )
}

/// Discovered dependencies keyed by canonical path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    entries: BTreeMap<PathBuf, DependencyEntry>,
}

impl DependencyGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `source_path` unless it is already present.
    ///
    /// Returns `true` when a new entry was created.
    pub fn insert(&mut self, source_path: PathBuf, original_import_path: &str) -> bool {
        if self.entries.contains_key(&source_path) {
            return false;
        }
        let entry = DependencyEntry {
            scratch_filename: scratch_filename(&source_path),
            original_import_path: original_import_path.to_string(),
            source_path: source_path.clone(),
        };
        self.entries.insert(source_path, entry);
        true
    }

    /// Whether `source_path` has been discovered.
    #[must_use]
    pub fn contains(&self, source_path: &Path) -> bool {
        self.entries.contains_key(source_path)
    }

    /// Entry for `source_path`.
    #[must_use]
    pub fn get(&self, source_path: &Path) -> Option<&DependencyEntry> {
        self.entries.get(source_path)
    }

    /// Scratch file name for `source_path`, if discovered.
    #[must_use]
    pub fn scratch_filename_for(&self, source_path: &Path) -> Option<&str> {
        self.entries.get(source_path).map(|entry| entry.scratch_filename.as_str())
    }

    /// All entries, ordered by path.
    pub fn entries(&self) -> impl Iterator<Item = &DependencyEntry> {
        self.entries.values()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the graph is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
