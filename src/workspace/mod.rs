//! Scratch directory management.
//!
//! A [`ScratchWorkspace`] owns the directory the compiler runs in. Every
//! compilation gets its own job directory inside it:
//!
//! | Kind | Path | Lifetime |
//! |---|---|---|
//! | job directory | `typst_<random>/` | one compilation |
//! | entrypoint | `typst_<random>/typst_<random>.typ` | one compilation |
//! | dependency | `typst_<random>/imported_<hash>_<basename>` | one compilation |
//! | artifact | `<entrypoint stem>.<format>` | until the caller is done with it |
//!
//! Dependencies sit next to the entrypoint that imports them, so two
//! compilations importing the same file each get a private copy and never
//! delete each other's. The job directory is removed when its
//! [`CompilationJob`] is dropped. Artifacts live in the scratch directory
//! itself and share the random part of the job name.
//!
//! # Debug Preservation
//!
//! With a debug directory configured, every file is copied there as
//! `<timestamp>_<role>_<basename>` right before it is deleted.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::config::TypstConfig;
use crate::constants::{
    DEPENDENCY_FILE_PREFIX, INPUT_FILE_PREFIX, INPUT_FILE_RANDOM_LEN, INPUT_FILE_SUFFIX,
};
use crate::core::{Result, TypstError};
use crate::utils::fs::{ensure_canonical_dir, ensure_dir, file_name_str, remove_file_if_exists};

/// What a scratch file was used for; part of preserved debug file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactRole {
    /// Allocated entrypoint
    Input,
    /// Materialized dependency
    Dependency,
    /// Compiled artifact
    Output,
}

impl ArtifactRole {
    /// Lowercase name used in debug file names.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Dependency => "dependency",
            Self::Output => "output",
        }
    }
}

/// The scratch directory of one service configuration.
#[derive(Debug, Clone)]
pub struct ScratchWorkspace {
    directory: PathBuf,
    debug_directory: Option<PathBuf>,
}

impl ScratchWorkspace {
    /// Open `directory`, creating it if needed.
    ///
    /// When `debug_directory` is given it is created too, and scratch files
    /// are preserved there before deletion.
    ///
    /// # Errors
    ///
    /// [`TypstError::WorkspaceError`] if either directory cannot be created.
    pub fn open(directory: &Path, debug_directory: Option<&Path>) -> Result<Self> {
        let directory = ensure_canonical_dir(directory).map_err(|e| TypstError::WorkspaceError {
            path: directory.to_path_buf(),
            reason: format!("{e:#}"),
        })?;

        if let Some(debug_dir) = debug_directory {
            ensure_dir(debug_dir).map_err(|e| TypstError::WorkspaceError {
                path: debug_dir.to_path_buf(),
                reason: format!("{e:#}"),
            })?;
        }

        Ok(Self {
            directory,
            debug_directory: debug_directory.map(Path::to_path_buf),
        })
    }

    /// Open the workspace described by `config`.
    pub fn from_config(config: &TypstConfig) -> Result<Self> {
        let debug_directory = config.debug.then_some(config.debug_directory.as_path());
        Self::open(&config.working_directory, debug_directory)
    }

    /// Canonical path of the scratch directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Debug preservation directory, when enabled.
    #[must_use]
    pub fn debug_directory(&self) -> Option<&Path> {
        self.debug_directory.as_deref()
    }

    /// Re-create the scratch directory if it has been removed.
    pub fn ensure(&self) -> Result<()> {
        ensure_dir(&self.directory).map_err(|e| TypstError::WorkspaceError {
            path: self.directory.clone(),
            reason: format!("{e:#}"),
        })
    }

    /// Create a fresh `typst_<random>/` job directory for one compilation.
    ///
    /// # Errors
    ///
    /// [`TypstError::TempFileError`] if the directory cannot be created.
    pub fn begin_job(&self) -> Result<CompilationJob<'_>> {
        let directory = tempfile::Builder::new()
            .prefix(INPUT_FILE_PREFIX)
            .rand_bytes(INPUT_FILE_RANDOM_LEN)
            .tempdir_in(&self.directory)
            .map_err(|e| TypstError::TempFileError {
                path: self.directory.clone(),
                reason: e.to_string(),
            })?;

        tracing::debug!(target: "typst", "Opened job directory {}", directory.path().display());
        Ok(CompilationJob {
            workspace: self,
            directory: Some(directory),
            input: None,
            dependencies: Vec::new(),
        })
    }

    /// Artifact path for an allocated input: same stem, `format` extension,
    /// directly inside the scratch directory.
    #[must_use]
    pub fn output_path_for(&self, input: &Path, format: &str) -> PathBuf {
        let stem = input.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        self.directory.join(format!("{stem}.{format}"))
    }

    /// Delete a compiled artifact once its bytes have been read.
    pub fn cleanup_output(&self, path: &Path) {
        if let Some(debug_dir) = &self.debug_directory {
            preserve(path, debug_dir, ArtifactRole::Output);
        }

        if let Err(e) = remove_file_if_exists(path) {
            tracing::warn!(target: "typst", "Cleanup failed: {:#}", e);
        }
    }

    /// Delete job directories and `imported_*` files left behind by a
    /// process that exited mid-compilation.
    ///
    /// This also removes the job directories of compilations still in
    /// flight, so it must not run concurrently with one. Returns the number
    /// of entries removed.
    pub fn purge_stale(&self) -> usize {
        let root = glob::Pattern::escape(&self.directory.to_string_lossy());
        let mut removed = 0;

        for prefix in [INPUT_FILE_PREFIX, DEPENDENCY_FILE_PREFIX] {
            let pattern = format!("{root}/{prefix}*");
            let entries = match glob::glob(&pattern) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(target: "typst", "Invalid sweep pattern {}: {}", pattern, e);
                    continue;
                }
            };

            for path in entries.flatten() {
                let result = if path.is_dir() && prefix == INPUT_FILE_PREFIX {
                    fs::remove_dir_all(&path).map(|()| true)
                } else if path.is_file() && prefix == DEPENDENCY_FILE_PREFIX {
                    fs::remove_file(&path).map(|()| true)
                } else {
                    Ok(false)
                };

                match result {
                    Ok(true) => removed += 1,
                    Ok(false) => {}
                    Err(e) => tracing::warn!(target: "typst", "Failed to purge {}: {}", path.display(), e),
                }
            }
        }

        tracing::debug!(target: "typst", "Purged {} stale scratch entries", removed);
        removed
    }
}

fn preserve(path: &Path, debug_dir: &Path, role: ArtifactRole) {
    if !path.is_file() {
        return;
    }

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S_%3f");
    let target = debug_dir.join(format!("{}_{}_{}", timestamp, role.as_str(), file_name_str(path)));

    match fs::copy(path, &target) {
        Ok(_) => {
            tracing::debug!(target: "typst", "Preserved {} as {}", path.display(), target.display());
        }
        Err(e) => {
            tracing::warn!(
                target: "typst",
                "Failed to preserve {} in {}: {}",
                path.display(),
                debug_dir.display(),
                e
            );
        }
    }
}

/// The private job directory of one compilation.
///
/// Dropping it preserves the entrypoint and dependencies (in debug mode) and
/// removes the directory. This covers every exit path of a compilation,
/// including errors, timeouts and a dropped future. The compiled artifact
/// lives outside the job directory and is not touched.
#[derive(Debug)]
pub struct CompilationJob<'a> {
    workspace: &'a ScratchWorkspace,
    directory: Option<TempDir>,
    input: Option<PathBuf>,
    dependencies: Vec<PathBuf>,
}

impl CompilationJob<'_> {
    /// Path of the job directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        self.directory.as_ref().map_or(self.workspace.directory(), TempDir::path)
    }

    /// Write `content` as the job's `typst_<random>.typ` entrypoint.
    ///
    /// The entrypoint shares its name with the job directory, so artifact
    /// paths derived from it are unique too.
    ///
    /// # Errors
    ///
    /// [`TypstError::TempFileError`] if the file cannot be written.
    pub fn allocate_input(&mut self, content: &str) -> Result<PathBuf> {
        let directory = self.directory();
        let path = directory.join(format!("{}{}", file_name_str(directory), INPUT_FILE_SUFFIX));
        fs::write(&path, content).map_err(|e| TypstError::TempFileError {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        tracing::debug!(target: "typst", "Allocated input file {}", path.display());
        self.input = Some(path.clone());
        Ok(path)
    }

    /// Write a dependency under its scratch name next to the entrypoint.
    ///
    /// # Errors
    ///
    /// [`TypstError::TempFileError`] if the file cannot be written.
    pub fn write_dependency(&mut self, scratch_filename: &str, content: &[u8]) -> Result<PathBuf> {
        let path = self.directory().join(scratch_filename);
        fs::write(&path, content).map_err(|e| TypstError::TempFileError {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        tracing::trace!(target: "typst", "Wrote dependency {}", path.display());
        if !self.dependencies.contains(&path) {
            self.dependencies.push(path.clone());
        }
        Ok(path)
    }

    /// Files written so far, entrypoint first.
    #[must_use]
    pub fn tracked(&self) -> Vec<&Path> {
        self.input.iter().chain(self.dependencies.iter()).map(PathBuf::as_path).collect()
    }
}

impl Drop for CompilationJob<'_> {
    fn drop(&mut self) {
        if let Some(debug_dir) = self.workspace.debug_directory() {
            if let Some(input) = &self.input {
                preserve(input, debug_dir, ArtifactRole::Input);
            }
            for dependency in &self.dependencies {
                preserve(dependency, debug_dir, ArtifactRole::Dependency);
            }
        }

        if let Some(directory) = self.directory.take() {
            let path = directory.path().to_path_buf();
            if let Err(e) = directory.close() {
                tracing::warn!(target: "typst", "Failed to remove job directory {}: {}", path.display(), e);
            }
        }
    }
}
