//! Scanning and rewriting of Typst import directives.
//!
//! Two directive forms are recognized, both strictly within one line:
//!
//! - `#import "<path>" : <bindings>`, the standard Typst module import. The
//!   binding list is captured verbatim up to the end of the line and is never
//!   parsed.
//! - `#!import "<path>" with_data: <name>`, a preprocessor directive that is
//!   replaced by `#let` declarations built from the call's bindings, optionally
//!   followed by a wildcard import of `<path>`.
//!
//! Anything that does not match these shapes (an empty path, a missing colon,
//! a directive split across lines) is inert text and passes through untouched.

use regex::{Captures, Regex};
use serde_json::Value;
use std::ops::Range;
use std::sync::LazyLock;

use super::encoder::{encode, encode_with_depth, is_identifier};
use super::Bindings;
use crate::constants::MAX_ENCODE_DEPTH;

static IMPORT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"#import[ \t]+"([^"]+)"[ \t]*:[ \t]*([^\n\r]+)"#)
        .expect("import pattern is a valid regex")
});

static DATA_IMPORT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"#!import[ \t]+"([^"]*)"[ \t]+with_data:[ \t]*([A-Za-z0-9_]+)"#)
        .expect("data import pattern is a valid regex")
});

/// One `#import "<path>" : <bindings>` occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDirective {
    /// The quoted module path, without quotes.
    pub path: String,
    /// Raw binding-list text up to the end of the line.
    pub bindings: String,
    /// Byte range of the whole directive in the scanned text.
    pub span: Range<usize>,
    /// Byte range of the path inside the quotes.
    pub path_span: Range<usize>,
}

impl ImportDirective {
    fn from_captures(caps: &Captures<'_>) -> Option<Self> {
        let whole = caps.get(0)?;
        let path = caps.get(1)?;
        let bindings = caps.get(2)?;
        Some(Self {
            path: path.as_str().to_string(),
            bindings: bindings.as_str().to_string(),
            span: whole.range(),
            path_span: path.range(),
        })
    }

    /// Whether the path is absolute (`/`-prefixed) and therefore never resolved.
    #[must_use]
    pub fn is_absolute(&self) -> bool {
        self.path.starts_with('/')
    }
}

/// Find every standard import directive in `text`, in order of appearance.
///
/// # Examples
///
/// ```
/// use typst_prep::markup::scan_imports;
///
/// let imports = scan_imports("#import \"Styles.typ\" : *\n#import \"lib.typ\" : a, b as c\n");
/// assert_eq!(imports.len(), 2);
/// assert_eq!(imports[0].path, "Styles.typ");
/// assert_eq!(imports[1].bindings, "a, b as c");
/// ```
#[must_use]
pub fn scan_imports(text: &str) -> Vec<ImportDirective> {
    IMPORT_PATTERN
        .captures_iter(text)
        .filter_map(|caps| ImportDirective::from_captures(&caps))
        .collect()
}

/// Replace the path of each import directive for which `replacement` returns `Some`.
///
/// Only the text between the quotes changes; the `#import` keyword, spacing,
/// colon and binding list are kept byte for byte. Directives for which the
/// closure returns `None` are left unchanged.
pub fn rewrite_imports<F>(text: &str, mut replacement: F) -> String
where
    F: FnMut(&ImportDirective) -> Option<String>,
{
    let mut result = String::with_capacity(text.len());
    let mut last = 0;

    for directive in scan_imports(text) {
        if let Some(new_path) = replacement(&directive) {
            result.push_str(&text[last..directive.path_span.start]);
            result.push_str(&new_path);
            last = directive.path_span.end;
        }
    }

    result.push_str(&text[last..]);
    result
}

/// Whether `text` contains at least one `#!import ... with_data:` directive.
#[must_use]
pub fn contains_data_import(text: &str) -> bool {
    DATA_IMPORT_PATTERN.is_match(text)
}

/// Replace every `#!import "<path>" with_data: <name>` directive.
///
/// When `data[name]` is an object or array the directive becomes
/// `#let <name> = <whole value>`, then one `#let <key> = <value>` per
/// top-level key that is a valid identifier, then `#import "<path>" : *` when
/// the path is non-empty. Otherwise only the import is emitted (or nothing,
/// for an empty path). Lines are joined with `\n`.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use typst_prep::markup::expand_data_imports;
///
/// let data = json!({"config": {"title": "T"}});
/// let out = expand_data_imports("#!import \"Base.typ\" with_data: config", data.as_object().unwrap());
/// assert_eq!(out, "#let config = (title: \"T\")\n#let title = \"T\"\n#import \"Base.typ\" : *");
/// ```
#[must_use]
pub fn expand_data_imports(text: &str, data: &Bindings) -> String {
    DATA_IMPORT_PATTERN
        .replace_all(text, |caps: &Captures<'_>| {
            let path = caps.get(1).map_or("", |m| m.as_str());
            let name = caps.get(2).map_or("", |m| m.as_str());
            data_import_block(path, name, data)
        })
        .into_owned()
}

fn data_import_block(path: &str, name: &str, data: &Bindings) -> String {
    let mut lines = Vec::new();

    let value = data.get(name).filter(|_| is_identifier(name));
    match value {
        Some(whole @ Value::Object(map)) => {
            lines.push(format!("#let {name} = {}", encode(whole)));
            for (key, item) in map {
                if is_identifier(key) {
                    lines.push(format!("#let {key} = {}", encode_with_depth(item, 1, MAX_ENCODE_DEPTH)));
                }
            }
        }
        // Array indices are never identifiers, so only the whole value is bound
        Some(whole @ Value::Array(_)) => {
            lines.push(format!("#let {name} = {}", encode(whole)));
        }
        _ => {
            tracing::debug!(
                target: "typst",
                "No object or array bound to '{}'; emitting plain import",
                name
            );
        }
    }

    if !path.is_empty() {
        lines.push(format!("#import \"{path}\" : *"));
    }

    lines.join("\n")
}
