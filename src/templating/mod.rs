//! Templating layer for Typst sources.
//!
//! Typst files may carry Tera syntax on top of the markup:
//!
//! - Variable substitution: `{{ invoice.number }}`
//! - Conditional logic: `{% if draft %}...{% endif %}`
//! - Loops: `{% for row in rows %}...{% endfor %}`
//! - Comments: `{# ignored #}`
//!
//! The entrypoint of every compilation is rendered with the call's bindings.
//! Imported files are rendered only when their name ends in `.tera.typ`; all
//! other dependency files are copied byte for byte.
//!
//! # Security
//!
//! [`security::check_template`] rejects any template whose expressions call a
//! process, evaluation, file or filesystem-mutation function, before the
//! engine is involved. See [`security::DENIED_FUNCTIONS`].

pub mod renderer;
pub mod security;

pub use renderer::{TemplateRenderer, contains_template_syntax, format_tera_error};
pub use security::{DENIED_FUNCTIONS, check_template};

use std::path::Path;

use crate::constants::TEMPLATE_FILE_MARKER;

/// Whether a dependency file is rendered before its imports are rewritten.
///
/// ```
/// use std::path::Path;
/// use typst_prep::templating::is_render_eligible;
///
/// assert!(is_render_eligible(Path::new("/srv/app/resources/typst/Header.tera.typ")));
/// assert!(!is_render_eligible(Path::new("/srv/app/resources/typst/Styles.typ")));
/// ```
#[must_use]
pub fn is_render_eligible(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(TEMPLATE_FILE_MARKER) && name.len() > TEMPLATE_FILE_MARKER.len())
}
