//! Global constants used throughout the preprocessing pipeline.
//!
//! This module contains default configuration values, scratch file naming
//! prefixes, import path conventions and recursion limits. Defining them
//! centrally keeps the resolver, the workspace and the configuration layer
//! in agreement about file names.

/// Compiler binary used when none is configured or the configured one is rejected.
pub const DEFAULT_BIN_PATH: &str = "typst";

/// Output format used when none is configured or the configured one is rejected.
pub const DEFAULT_FORMAT: &str = "pdf";

/// Default compiler timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Scratch directory, relative to the project base path.
pub const DEFAULT_WORKING_SUBDIR: &str = "storage/typst";

/// Debug preservation directory, relative to the project base path.
pub const DEFAULT_DEBUG_SUBDIR: &str = "storage/typst-debug";

/// Template resource directory, relative to the project base path.
///
/// Bare import paths of an entrypoint without a base directory resolve here.
pub const TEMPLATE_RESOURCE_SUBDIR: &str = "resources/typst";

/// Import paths starting with this prefix resolve against the project base path.
pub const PACKAGE_ROOT_PREFIX: &str = "resources/typst/";

/// Prefix of allocated entrypoint files inside the scratch directory.
pub const INPUT_FILE_PREFIX: &str = "typst_";

/// Extension of allocated entrypoint files.
pub const INPUT_FILE_SUFFIX: &str = ".typ";

/// Prefix of materialized dependency files inside the scratch directory.
pub const DEPENDENCY_FILE_PREFIX: &str = "imported_";

/// File name suffix marking a dependency as a template to render before rewriting.
pub const TEMPLATE_FILE_MARKER: &str = ".tera.typ";

/// Maximum nesting depth for value encoding before values collapse to `""`.
pub const MAX_ENCODE_DEPTH: usize = 50;

/// Number of hash bytes (rendered as hex) used in dependency scratch names.
pub const SCRATCH_HASH_BYTES: usize = 16;

/// Number of random characters in allocated entrypoint file names.
pub const INPUT_FILE_RANDOM_LEN: usize = 16;

/// Characters that never belong in a binary path or format token.
pub const SHELL_METACHARACTERS: &[char] = &[';', '&', '|', '`', '$', '<', '>', '\n', '\r', '\0'];
