//! Security utilities for configuration values and resolved paths
//!
//! This module provides the checks that keep untrusted input out of the
//! compiler argument vector and keep import resolution away from sensitive
//! system directories.

use std::path::Path;

use crate::constants::SHELL_METACHARACTERS;

/// Security blacklist for resolved import paths
/// Imports resolving into these directories are treated as missing
pub static BLACKLISTED_PATHS: &[&str] = &[
    "/etc",                    // System configuration
    "/sys",                    // System information
    "/proc",                   // Process information
    "/dev",                    // Device files
    "/boot",                   // Boot files
    "/bin",                    // System binaries
    "/sbin",                   // System binaries
    "/usr/bin",                // User binaries
    "/usr/sbin",               // User system binaries
    "/System",                 // macOS system
    "/Library",                // macOS system libraries
    "/private/etc",            // macOS etc
    "/private/var/db",         // macOS system databases
    "C:\\Windows",             // Windows system
    "C:\\Program Files",       // Windows programs
    "C:\\Program Files (x86)", // Windows 32-bit programs
    "C:\\ProgramData",         // Windows program data
];

/// Check if a path points into a sensitive system directory
///
/// # Examples
/// ```
/// use typst_prep::utils::security::is_path_blacklisted;
/// use std::path::Path;
///
/// assert!(is_path_blacklisted(Path::new("/etc/passwd")));
/// assert!(!is_path_blacklisted(Path::new("/home/user/project/styles.typ")));
/// ```
#[must_use]
pub fn is_path_blacklisted(path: &Path) -> bool {
    BLACKLISTED_PATHS.iter().any(|blacklisted| path.starts_with(blacklisted))
}

/// Check whether a value contains a shell metacharacter.
///
/// The compiler is never run through a shell, but binary paths and formats
/// carrying these characters are a sign of an injection attempt and are
/// rejected at configuration time.
#[must_use]
pub fn contains_shell_metacharacters(value: &str) -> bool {
    value.contains(SHELL_METACHARACTERS)
}

/// Check whether a value is usable as the compiler binary path.
#[must_use]
pub fn is_safe_bin_path(value: &str) -> bool {
    !value.trim().is_empty() && !contains_shell_metacharacters(value)
}

/// Check whether a value is usable as an output format.
///
/// The format becomes the artifact's file extension, so it must be a plain
/// ASCII alphanumeric token (no separators, no dots).
///
/// ```
/// use typst_prep::utils::security::is_safe_format;
///
/// assert!(is_safe_format("pdf"));
/// assert!(is_safe_format("png"));
/// assert!(!is_safe_format("pdf; rm -rf /"));
/// assert!(!is_safe_format("../pdf"));
/// ```
#[must_use]
pub fn is_safe_format(value: &str) -> bool {
    !value.is_empty()
        && !contains_shell_metacharacters(value)
        && value.chars().all(|c| c.is_ascii_alphanumeric())
}
