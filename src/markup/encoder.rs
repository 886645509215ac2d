//! Conversion of JSON-like host values into Typst literals.
//!
//! Bindings arrive as [`serde_json::Value`]s and leave as Typst source text
//! that can follow `#let name = ` directly:
//!
//! | Value | Typst literal |
//! |---|---|
//! | string | `"escaped text"` |
//! | number | decimal text as printed by `serde_json` |
//! | bool | `true` / `false` |
//! | null | `""` |
//! | array | `(a, b, c)`; a single element keeps a trailing comma: `(a,)` |
//! | object | `(key: value, "not-an-ident": value)` in insertion order |
//!
//! Empty arrays and objects both become `()`.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use crate::constants::MAX_ENCODE_DEPTH;

/// Literal emitted for null values and for anything nested too deeply.
const EMPTY_STRING_LITERAL: &str = "\"\"";

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is a valid regex")
});

/// Encode a value as a Typst literal with the default depth limit.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use typst_prep::markup::encode;
///
/// assert_eq!(encode(&json!([1, "two", true])), r#"(1, "two", true)"#);
/// assert_eq!(encode(&json!({"name": "John", "age": 30})), r#"(name: "John", age: 30)"#);
/// assert_eq!(encode(&json!(null)), r#""""#);
/// ```
#[must_use]
pub fn encode(value: &Value) -> String {
    encode_with_depth(value, 0, MAX_ENCODE_DEPTH)
}

/// Encode `value`, which sits `depth` levels below the top-level value.
///
/// Once `depth` exceeds `max_depth` the empty-string literal is returned
/// without looking at the value.
#[must_use]
pub fn encode_with_depth(value: &Value, depth: usize, max_depth: usize) -> String {
    if depth > max_depth {
        return EMPTY_STRING_LITERAL.to_string();
    }

    match value {
        Value::Null => EMPTY_STRING_LITERAL.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => encode_string(s),
        Value::Array(items) => {
            let parts: Vec<String> =
                items.iter().map(|item| encode_with_depth(item, depth + 1, max_depth)).collect();
            match parts.len() {
                0 => "()".to_string(),
                // `(x)` is just a parenthesized expression in Typst
                1 => format!("({},)", parts[0]),
                _ => format!("({})", parts.join(", ")),
            }
        }
        Value::Object(map) => {
            if map.is_empty() {
                return "()".to_string();
            }
            let parts: Vec<String> = map
                .iter()
                .map(|(key, item)| {
                    format!("{}: {}", encode_key(key), encode_with_depth(item, depth + 1, max_depth))
                })
                .collect();
            format!("({})", parts.join(", "))
        }
    }
}

/// Quote and escape a string as a Typst string literal.
///
/// Characters are escaped one at a time, so a backslash in the input is never
/// escaped twice.
#[must_use]
pub fn encode_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\'' => out.push_str("\\u{27}"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\u{c}' => out.push_str("\\u{c}"),
            '\u{8}' => out.push_str("\\u{8}"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// Whether `name` can be used bare as a Typst variable or dictionary key.
#[must_use]
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

fn encode_key(key: &str) -> String {
    if is_identifier(key) {
        key.to_string()
    } else {
        encode_string(key)
    }
}
