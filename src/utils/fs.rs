//! File system helpers for the scratch workspace.
//!
//! Thin wrappers around `std::fs` that attach the path to every error so
//! failures can be reported without extra bookkeeping at the call site.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Ensures a directory exists, creating it and its parents if necessary.
///
/// # Returns
///
/// - `Ok(())` if the directory exists or was successfully created
/// - `Err` if the path exists but is not a directory, or creation fails
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    } else if !path.is_dir() {
        return Err(anyhow::anyhow!("Path exists but is not a directory: {}", path.display()));
    }
    Ok(())
}

/// Creates `path` if needed and returns its canonical absolute form.
pub fn ensure_canonical_dir(path: &Path) -> Result<PathBuf> {
    ensure_dir(path)?;
    fs::canonicalize(path).with_context(|| format!("Failed to canonicalize {}", path.display()))
}

/// Removes a file, treating "already gone" as success.
///
/// Returns `true` when a file was actually removed.
pub fn remove_file_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}

/// Returns the final path component as text, or an empty string.
#[must_use]
pub fn file_name_str(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}
