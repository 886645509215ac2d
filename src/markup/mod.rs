//! Typst source text handling: value literals and import directives.
//!
//! Nothing in this module touches the filesystem. [`encoder`] turns call
//! bindings into Typst literals and [`directives`] finds, rewrites and expands
//! import directives in template text.

pub mod directives;
pub mod encoder;

pub use directives::{
    ImportDirective, contains_data_import, expand_data_imports, rewrite_imports, scan_imports,
};
pub use encoder::{encode, encode_string, encode_with_depth, is_identifier};

/// Variable bindings supplied with one compilation call, in insertion order.
pub type Bindings = serde_json::Map<String, serde_json::Value>;
