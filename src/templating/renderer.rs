//! Template rendering with Tera.
//!
//! [`TemplateRenderer`] renders the templating layer of a Typst source with the
//! bindings of one compilation call. Every render runs the deny-list gate
//! first, then creates a fresh Tera instance, so nothing leaks between calls.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use strsim::levenshtein;
use tera::{Context as TeraContext, Tera};

use super::security::check_template;
use crate::core::{Result, TypstError};
use crate::markup::{Bindings, contains_data_import};

/// Maximum allowed Levenshtein distance as a percentage of target length for suggestions.
const SIMILARITY_THRESHOLD_PERCENT: usize = 50;

static TEMPLATE_SYNTAX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\{\{.*?\}\}|\{%.*?%\}|\{#.*?#\}|\{!!.*?!!\}")
        .expect("template syntax pattern is a valid regex")
});

static MISSING_VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Variable `([^`]+)` not found").expect("missing variable pattern is a valid regex")
});

/// Whether `text` contains anything the renderer would act on.
///
/// Recognizes `{{ }}`, `{% %}`, `{# #}`, `{!! !!}` and the data-injecting
/// import directive.
#[must_use]
pub fn contains_template_syntax(text: &str) -> bool {
    TEMPLATE_SYNTAX.is_match(text) || contains_data_import(text)
}

/// Renders the templating layer of Typst sources.
///
/// # Security
///
/// - The deny-list gate runs before the engine sees the text
/// - Tera has no host-code evaluation, includes resolve against an empty
///   template set, and `get_env` is replaced by a function that always fails
/// - A failed render never returns partial output
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateRenderer;

impl TemplateRenderer {
    /// Render `text` with `bindings`.
    ///
    /// `name` identifies the template in error messages (the entrypoint or a
    /// dependency file name).
    ///
    /// Returns the input unchanged, without involving Tera, when `bindings` is
    /// empty and [`contains_template_syntax`] finds nothing.
    ///
    /// # Errors
    ///
    /// - [`TypstError::SecurityRejection`] when the deny-list gate matches
    /// - [`TypstError::RenderError`] when Tera fails to parse or render
    pub fn render(&self, name: &str, text: &str, bindings: &Bindings) -> Result<String> {
        check_template(text)?;

        if bindings.is_empty() && !contains_template_syntax(text) {
            tracing::trace!(target: "typst", "No template syntax in '{}', skipping render", name);
            return Ok(text.to_string());
        }

        tracing::debug!(
            target: "typst",
            "Rendering '{}' with {} binding(s)",
            name,
            bindings.len()
        );

        let context = TeraContext::from_value(serde_json::Value::Object(bindings.clone())).map_err(
            |e| TypstError::RenderError {
                template: name.to_string(),
                message: format_tera_error(&e),
            },
        )?;

        // Fresh instance per render, no shared template state
        let mut tera = Tera::default();
        tera.register_function("get_env", disabled_get_env);

        tera.render_str(text, &context).map_err(|e| TypstError::RenderError {
            template: name.to_string(),
            message: describe_render_failure(&e, bindings),
        })
    }
}

fn disabled_get_env(_args: &HashMap<String, tera::Value>) -> tera::Result<tera::Value> {
    Err(tera::Error::msg("get_env is not available in templates"))
}

fn describe_render_failure(error: &tera::Error, bindings: &Bindings) -> String {
    let message = format_tera_error(error);

    let Some(name) = MISSING_VARIABLE.captures(&message).and_then(|caps| caps.get(1)) else {
        return message;
    };

    let available: Vec<&str> = bindings.keys().map(String::as_str).collect();
    let suggestions = find_similar_variables(name.as_str(), &available);
    if suggestions.is_empty() {
        message
    } else {
        format!("{message} (did you mean: {}?)", suggestions.join(", "))
    }
}

/// Find similar variable names using Levenshtein distance
fn find_similar_variables(target: &str, available: &[&str]) -> Vec<String> {
    let mut scored: Vec<_> = available.iter().map(|var| (*var, levenshtein(target, var))).collect();

    // Sort by distance (closest first)
    scored.sort_by_key(|(_, dist)| *dist);

    scored
        .into_iter()
        .filter(|(_, dist)| *dist <= target.len() * SIMILARITY_THRESHOLD_PERCENT / 100)
        .take(3)
        .map(|(var, _)| var.to_string())
        .collect()
}

/// Flatten a Tera error chain into one readable message.
///
/// Tera names one-off templates `__tera_one_off`; those references are removed.
pub fn format_tera_error(error: &tera::Error) -> String {
    use std::error::Error;

    let mut all_messages = vec![error.to_string()];
    let mut current_error: Option<&dyn Error> = error.source();
    while let Some(err) = current_error {
        all_messages.push(err.to_string());
        current_error = err.source();
    }

    let messages: Vec<String> = all_messages
        .into_iter()
        .map(|msg| {
            msg.replace("while rendering '__tera_one_off'", "")
                .replace("Failed to render '__tera_one_off'", "Template rendering failed")
                .replace("Failed to parse '__tera_one_off'", "Template syntax error")
                .replace("'__tera_one_off'", "template")
                .trim()
                .to_string()
        })
        .filter(|msg| {
            !msg.is_empty() && msg != "Template rendering failed" && msg != "Template syntax error"
        })
        .collect();

    if messages.is_empty() {
        "Template syntax error".to_string()
    } else {
        messages.join(": ")
    }
}
