//! Compiler configuration for typst-prep.
//!
//! [`TypstConfig`] is the typed configuration consumed by the compilation
//! service. It is changed only through [`ConfigUpdate`], a partial update whose
//! fields are validated one by one: an invalid value is replaced by the
//! field's default instead of being reported as an error.
//!
//! # Sources
//!
//! Configuration is layered in this order, later layers winning:
//!
//! 1. Built-in defaults derived from the project base path
//! 2. A TOML file (optional)
//! 3. `TYPST_*` environment variables
//!
//! # File Format
//!
//! ```toml
//! bin_path = "/usr/local/bin/typst"
//! working_directory = "~/.cache/typst-prep"
//! timeout = 120
//! format = "pdf"
//! font_paths = ["/usr/share/fonts/custom"]
//! root = "/srv/app"
//! debug = false
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Field |
//! |---|---|
//! | `TYPST_BIN_PATH` | `bin_path` |
//! | `TYPST_WORKING_DIR` | `working_directory` |
//! | `TYPST_TIMEOUT` | `timeout` |
//! | `TYPST_FORMAT` | `format` |
//! | `TYPST_ROOT` | `root` |
//! | `TYPST_FONT_PATHS` | `font_paths` (platform path-list separator) |
//! | `TYPST_BASE_PATH` | `base_path` |
//! | `TYPST_DEBUG` | `debug` |
//! | `TYPST_DEBUG_DIR` | `debug_directory` |

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    DEFAULT_BIN_PATH, DEFAULT_DEBUG_SUBDIR, DEFAULT_FORMAT, DEFAULT_TIMEOUT_SECS,
    DEFAULT_WORKING_SUBDIR, TEMPLATE_RESOURCE_SUBDIR,
};
use crate::utils::security::{is_safe_bin_path, is_safe_format};

/// Typed configuration for the compilation service.
///
/// Every compilation clones the configuration when it starts, so updates made
/// through [`TypstConfig::apply`] never affect a compilation already in flight.
///
/// # Examples
///
/// ```rust,no_run
/// use typst_prep::config::{ConfigUpdate, TypstConfig};
///
/// let mut config = TypstConfig::with_base_path("/srv/app");
/// config.apply(ConfigUpdate {
///     format: Some("png".to_string()),
///     ..ConfigUpdate::default()
/// });
/// assert_eq!(config.format, "png");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypstConfig {
    /// Compiler binary, looked up on `PATH` when not absolute.
    pub bin_path: String,

    /// Scratch directory; created on demand.
    pub working_directory: PathBuf,

    /// Compiler timeout in seconds; `0` disables the timeout.
    pub timeout: u64,

    /// Default output format, also the artifact's file extension.
    pub format: String,

    /// Font directories passed as `--font-path` on every compilation.
    pub font_paths: Vec<PathBuf>,

    /// `--root` override; the base path is used when absent.
    pub root: Option<PathBuf>,

    /// Project base path. `resources/typst/` imports and the default
    /// template-resource directory resolve against it.
    pub base_path: PathBuf,

    /// Copy scratch files into [`debug_directory`](Self::debug_directory) before deleting them.
    pub debug: bool,

    /// Permanent directory for preserved scratch files.
    pub debug_directory: PathBuf,
}

impl Default for TypstConfig {
    fn default() -> Self {
        let base = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::with_base_path(base)
    }
}

impl TypstConfig {
    /// Default configuration rooted at `base_path`.
    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        let base_path = base_path.into();
        Self {
            bin_path: DEFAULT_BIN_PATH.to_string(),
            working_directory: base_path.join(DEFAULT_WORKING_SUBDIR),
            timeout: DEFAULT_TIMEOUT_SECS,
            format: DEFAULT_FORMAT.to_string(),
            font_paths: Vec::new(),
            root: None,
            debug: false,
            debug_directory: base_path.join(DEFAULT_DEBUG_SUBDIR),
            base_path,
        }
    }

    /// Load configuration: defaults, then the optional TOML file, then the environment.
    ///
    /// A missing file is not an error; an unreadable or malformed one is.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = path {
            if path.exists() {
                config.apply(ConfigUpdate::from_toml_file(path)?);
            } else {
                tracing::debug!(target: "typst::config", "No config file at {}", path.display());
            }
        }

        config.apply(ConfigUpdate::from_env());
        Ok(config)
    }

    /// Apply a partial update, validating each present field.
    ///
    /// Invalid values are replaced by the field's default and logged at warn level:
    /// - `bin_path` containing a shell metacharacter, or blank, becomes `typst`
    /// - `format` that is not a plain alphanumeric token becomes `pdf`
    /// - `timeout` that is negative or not an integer becomes 60
    ///
    /// An empty `root` clears the override. Changing `base_path` re-derives the
    /// scratch and debug directories when they still hold their derived defaults.
    pub fn apply(&mut self, update: ConfigUpdate) {
        if let Some(base) = update.base_path {
            let base = expand_path(&base);
            let old_defaults = Self::with_base_path(&self.base_path);
            if self.working_directory == old_defaults.working_directory {
                self.working_directory = base.join(DEFAULT_WORKING_SUBDIR);
            }
            if self.debug_directory == old_defaults.debug_directory {
                self.debug_directory = base.join(DEFAULT_DEBUG_SUBDIR);
            }
            self.base_path = base;
        }

        if let Some(bin_path) = update.bin_path {
            if is_safe_bin_path(&bin_path) {
                self.bin_path = bin_path;
            } else {
                tracing::warn!(
                    target: "typst::config",
                    "Rejected binary path {:?}; using '{}'",
                    bin_path,
                    DEFAULT_BIN_PATH
                );
                self.bin_path = DEFAULT_BIN_PATH.to_string();
            }
        }

        if let Some(dir) = update.working_directory {
            self.working_directory = expand_path(&dir);
        }

        if let Some(timeout) = update.timeout {
            self.timeout = match timeout.seconds() {
                Some(seconds) => seconds,
                None => {
                    tracing::warn!(
                        target: "typst::config",
                        "Rejected timeout {:?}; using {}s",
                        timeout,
                        DEFAULT_TIMEOUT_SECS
                    );
                    DEFAULT_TIMEOUT_SECS
                }
            };
        }

        if let Some(format) = update.format {
            if is_safe_format(&format) {
                self.format = format;
            } else {
                tracing::warn!(
                    target: "typst::config",
                    "Rejected format {:?}; using '{}'",
                    format,
                    DEFAULT_FORMAT
                );
                self.format = DEFAULT_FORMAT.to_string();
            }
        }

        if let Some(font_paths) = update.font_paths {
            self.font_paths = font_paths.iter().map(|p| expand_path(p)).collect();
        }

        if let Some(root) = update.root {
            self.root = if root.trim().is_empty() {
                None
            } else {
                Some(expand_path(&root))
            };
        }

        if let Some(debug) = update.debug {
            self.debug = debug;
        }

        if let Some(dir) = update.debug_directory {
            self.debug_directory = expand_path(&dir);
        }
    }

    /// Compiler timeout, `None` when disabled.
    #[must_use]
    pub fn timeout_duration(&self) -> Option<Duration> {
        (self.timeout > 0).then(|| Duration::from_secs(self.timeout))
    }

    /// Directory that bare imports of a directory-less entrypoint resolve against.
    #[must_use]
    pub fn template_root(&self) -> PathBuf {
        self.base_path.join(TEMPLATE_RESOURCE_SUBDIR)
    }

    /// The `--root` value: the override when set, else the base path.
    #[must_use]
    pub fn effective_root(&self) -> &Path {
        self.root.as_deref().unwrap_or(&self.base_path)
    }
}

/// A timeout as written in a config file or environment variable.
///
/// Accepts integers and numeric strings; anything else deserializes to
/// [`TimeoutSetting::Invalid`] so that one bad field never fails a whole file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TimeoutSetting {
    /// Integer seconds
    Seconds(i64),
    /// Seconds as text, e.g. from an environment variable
    Text(String),
    /// Any other value
    Invalid(serde::de::IgnoredAny),
}

impl TimeoutSetting {
    /// Seconds when the value is a non-negative integer.
    #[must_use]
    pub fn seconds(&self) -> Option<u64> {
        match self {
            Self::Seconds(n) => u64::try_from(*n).ok(),
            Self::Text(text) => text.trim().parse::<u64>().ok(),
            Self::Invalid(_) => None,
        }
    }
}

impl From<u64> for TimeoutSetting {
    fn from(seconds: u64) -> Self {
        Self::Seconds(i64::try_from(seconds).unwrap_or(i64::MAX))
    }
}

/// Partial configuration update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigUpdate {
    /// Compiler binary
    pub bin_path: Option<String>,
    /// Scratch directory
    pub working_directory: Option<String>,
    /// Compiler timeout
    pub timeout: Option<TimeoutSetting>,
    /// Output format
    pub format: Option<String>,
    /// Font directories (replaces the configured list)
    pub font_paths: Option<Vec<String>>,
    /// `--root` override; empty clears it
    pub root: Option<String>,
    /// Project base path
    pub base_path: Option<String>,
    /// Debug preservation
    pub debug: Option<bool>,
    /// Debug preservation directory
    pub debug_directory: Option<String>,
}

impl ConfigUpdate {
    /// Read `TYPST_*` variables from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read `TYPST_*` variables through `lookup`.
    ///
    /// Empty values are ignored, except `TYPST_ROOT` where empty clears the
    /// override. `TYPST_DEBUG` accepts `1/0`, `true/false`, `yes/no`, `on/off`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        Self {
            bin_path: non_empty("TYPST_BIN_PATH"),
            working_directory: non_empty("TYPST_WORKING_DIR"),
            timeout: non_empty("TYPST_TIMEOUT").map(TimeoutSetting::Text),
            format: non_empty("TYPST_FORMAT"),
            font_paths: non_empty("TYPST_FONT_PATHS").map(|value| {
                std::env::split_paths(&value).map(|p| p.to_string_lossy().into_owned()).collect()
            }),
            root: lookup("TYPST_ROOT"),
            base_path: non_empty("TYPST_BASE_PATH"),
            debug: non_empty("TYPST_DEBUG").and_then(|v| parse_flag(&v)),
            debug_directory: non_empty("TYPST_DEBUG_DIR"),
        }
    }

    /// Parse an update from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse typst-prep configuration")
    }

    /// Parse an update from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Expand `~` and `$VAR` in a configured path, keeping the text as-is on failure.
fn expand_path(value: &str) -> PathBuf {
    match shellexpand::full(value) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(value),
    }
}
