//! Mapping of import paths to files on disk.
//!
//! An import path is resolved in one of three ways:
//!
//! 1. `resources/typst/...`: against the project base path
//! 2. any other relative path, when the importing file has a directory:
//!    against that directory
//! 3. otherwise: against the template resource directory
//!    (`<base>/resources/typst`)
//!
//! The result is canonicalized, so `..` segments and symlinks are resolved and
//! every file has exactly one key. It counts as found only if it is a regular
//! file outside the protected system directories.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::TypstConfig;
use crate::constants::PACKAGE_ROOT_PREFIX;
use crate::utils::security::is_path_blacklisted;

/// Base and resource directories of the host project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    base_path: PathBuf,
    template_root: PathBuf,
}

impl ProjectPaths {
    /// Paths with an explicit template resource directory.
    pub fn new(base_path: impl Into<PathBuf>, template_root: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            template_root: template_root.into(),
        }
    }

    /// Paths derived from a configuration.
    #[must_use]
    pub fn from_config(config: &TypstConfig) -> Self {
        Self::new(&config.base_path, config.template_root())
    }

    /// `relative` joined onto the base path.
    #[must_use]
    pub fn base_path(&self, relative: &str) -> PathBuf {
        self.base_path.join(relative)
    }

    /// `relative` joined onto the template resource directory.
    #[must_use]
    pub fn resource_path(&self, relative: &str) -> PathBuf {
        self.template_root.join(relative)
    }
}

/// Resolves import paths to canonical file paths.
#[derive(Debug, Clone)]
pub struct PathResolver {
    paths: ProjectPaths,
}

impl PathResolver {
    /// Create a resolver over the given project paths.
    #[must_use]
    pub fn new(paths: ProjectPaths) -> Self {
        Self {
            paths,
        }
    }

    /// Resolve `import_path` as seen from a file in `current_dir`.
    ///
    /// Returns `None` when the path is empty or absolute, when it does not
    /// lead to an existing regular file, or when the file lies in a protected
    /// system directory.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use std::path::Path;
    /// use typst_prep::resolver::{PathResolver, ProjectPaths};
    ///
    /// let resolver = PathResolver::new(ProjectPaths::new("/srv/app", "/srv/app/resources/typst"));
    /// let styles = resolver.resolve("../shared/Styles.typ", Some(Path::new("/srv/app/docs")));
    /// ```
    #[must_use]
    pub fn resolve(&self, import_path: &str, current_dir: Option<&Path>) -> Option<PathBuf> {
        if import_path.is_empty() || import_path.starts_with('/') || Path::new(import_path).is_absolute() {
            return None;
        }

        let candidate = if import_path.starts_with(PACKAGE_ROOT_PREFIX) {
            self.paths.base_path(import_path)
        } else if let Some(dir) = current_dir.filter(|dir| !dir.as_os_str().is_empty()) {
            dir.join(import_path)
        } else {
            self.paths.resource_path(import_path)
        };

        let canonical = match fs::canonicalize(&candidate) {
            Ok(path) => path,
            Err(e) => {
                tracing::trace!(
                    target: "typst::resolver",
                    "Cannot resolve '{}' ({}): {}",
                    import_path,
                    candidate.display(),
                    e
                );
                return None;
            }
        };

        if is_path_blacklisted(&canonical) {
            tracing::warn!(
                target: "typst::resolver",
                "Import '{}' resolves into a protected directory: {}",
                import_path,
                canonical.display()
            );
            return None;
        }

        canonical.is_file().then_some(canonical)
    }
}
