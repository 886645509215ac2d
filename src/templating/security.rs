//! Deny-list gate for template expressions.
//!
//! Before any template is rendered, every expression between `{{ }}`,
//! `{!! !!}` or `{% %}` is scanned for a call to one of
//! [`DENIED_FUNCTIONS`]. A match rejects the whole template with
//! [`TypstError::SecurityRejection`].
//!
//! The template engine has no way to call these functions in the first place;
//! the gate rejects templates that try, so that such input fails loudly
//! instead of rendering to something unexpected.

use regex::Regex;
use std::sync::LazyLock;

use crate::core::{Result, TypstError};

/// Host operations that must never appear as a call inside a template expression.
pub const DENIED_FUNCTIONS: &[&str] = &[
    // process execution
    "exec",
    "system",
    "shell_exec",
    "passthru",
    "proc_open",
    "popen",
    "spawn",
    // code evaluation
    "eval",
    "assert",
    "include",
    "include_once",
    "require",
    "require_once",
    // file access
    "file_get_contents",
    "file_put_contents",
    "fopen",
    "fwrite",
    "read_file",
    "write_file",
    "get_env",
    // filesystem mutation
    "unlink",
    "remove_file",
    "rmdir",
    "mkdir",
    "chmod",
    "chown",
    "rename",
    "copy",
    "symlink",
];

static EXPRESSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\{\{(.*?)\}\}|\{!!(.*?)!!\}|\{%(.*?)%\}")
        .expect("expression pattern is a valid regex")
});

static DENIED_CALL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let names: Vec<String> = DENIED_FUNCTIONS.iter().map(|name| regex::escape(name)).collect();
    Regex::new(&format!(r"(?i)\b({})\s*\(", names.join("|")))
        .expect("denied call pattern is a valid regex")
});

/// Reject `text` if any template expression calls a denied function.
///
/// # Examples
///
/// ```
/// use typst_prep::templating::check_template;
///
/// assert!(check_template("Hello {{ name | upper }}").is_ok());
/// assert!(check_template("{{ exec(\"id\") }}").is_err());
/// ```
pub fn check_template(text: &str) -> Result<()> {
    for caps in EXPRESSION_PATTERN.captures_iter(text) {
        let Some(body) = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)) else {
            continue;
        };

        if let Some(call) = DENIED_CALL_PATTERN.captures(body.as_str()) {
            let function = call.get(1).map_or_else(String::new, |m| m.as_str().to_string());
            tracing::warn!(target: "typst", "Rejected template calling '{}'", function);
            return Err(TypstError::SecurityRejection {
                function,
            });
        }
    }
    Ok(())
}
