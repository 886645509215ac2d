//! Supporting utilities: file system helpers and input validation.

pub mod fs;
pub mod security;

pub use fs::{ensure_dir, remove_file_if_exists};
pub use security::{contains_shell_metacharacters, is_path_blacklisted, is_safe_bin_path, is_safe_format};
