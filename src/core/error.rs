//! Error handling for typst-prep
//!
//! This module provides the error taxonomy for the preprocessing pipeline and
//! user-friendly error reporting for hosts that surface failures to people.
//! The error system follows two principles:
//! 1. **Strongly-typed errors** so callers can match on the failure kind
//! 2. **User-friendly messages** with actionable suggestions
//!
//! # Architecture
//!
//! - [`TypstError`] - one variant per failure kind of a compilation call
//! - [`ErrorContext`] - wrapper that adds suggestions and details for display
//!
//! Every [`TypstError`] is fatal to the compilation call that raised it. Scratch
//! cleanup has already run by the time the error reaches the caller.
//!
//! # Examples
//!
//! ```rust,no_run
//! use typst_prep::core::{TypstError, user_friendly_error};
//!
//! let error = TypstError::CompilationError {
//!     exit_code: Some(1),
//!     stderr: "error: unknown variable: title".to_string(),
//! };
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The error type for every public typst-prep operation.
///
/// # Error Categories
///
/// ## Inputs and workspace
/// - [`InputNotFound`] - entrypoint file does not exist
/// - [`InputReadFailed`] - entrypoint file exists but cannot be read as text
/// - [`WorkspaceError`] - scratch or debug directory could not be created
/// - [`TempFileError`] - scratch file allocation or write failed
///
/// ## Templating
/// - [`RenderError`] - the template engine rejected the template
/// - [`SecurityRejection`] - a denied function call appeared in a template expression
///
/// ## External compiler
/// - [`CompilerNotFound`] - the configured binary could not be started
/// - [`CompilationError`] - the compiler exited with a non-zero status
/// - [`Timeout`] - the compiler exceeded the configured timeout
/// - [`OutputReadError`] - the artifact is missing or unreadable after compilation
///
/// ## Configuration
/// - [`ConfigError`] - a configuration file could not be parsed
///
/// [`InputNotFound`]: TypstError::InputNotFound
/// [`InputReadFailed`]: TypstError::InputReadFailed
/// [`WorkspaceError`]: TypstError::WorkspaceError
/// [`TempFileError`]: TypstError::TempFileError
/// [`RenderError`]: TypstError::RenderError
/// [`SecurityRejection`]: TypstError::SecurityRejection
/// [`CompilerNotFound`]: TypstError::CompilerNotFound
/// [`CompilationError`]: TypstError::CompilationError
/// [`Timeout`]: TypstError::Timeout
/// [`OutputReadError`]: TypstError::OutputReadError
/// [`ConfigError`]: TypstError::ConfigError
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypstError {
    /// Caller-supplied entrypoint file does not exist
    #[error("Input file does not exist: {}", path.display())]
    InputNotFound {
        /// The path that was requested
        path: PathBuf,
    },

    /// Entrypoint file exists but could not be read
    #[error("Failed to read input file: {}: {reason}", path.display())]
    InputReadFailed {
        /// The path that was requested
        path: PathBuf,
        /// Underlying I/O failure
        reason: String,
    },

    /// Scratch or debug directory could not be created
    #[error("Failed to create working directory: {}: {reason}", path.display())]
    WorkspaceError {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying I/O failure
        reason: String,
    },

    /// Scratch file allocation or write failed
    #[error("Failed to create temporary file in {}: {reason}", path.display())]
    TempFileError {
        /// File or directory involved
        path: PathBuf,
        /// Underlying I/O failure
        reason: String,
    },

    /// Template engine raised while rendering
    ///
    /// `template` names what was being rendered: `entrypoint` or the file
    /// name of a render-eligible dependency.
    #[error("Template rendering failed: {message}")]
    RenderError {
        /// What was being rendered
        template: String,
        /// Engine diagnostic, cleaned of engine-internal template names
        message: String,
    },

    /// A denied function call was found inside a template expression
    #[error("Dangerous function \"{function}\" detected in template expression")]
    SecurityRejection {
        /// The denied function name
        function: String,
    },

    /// The compiler binary could not be started
    #[error("Typst binary could not be started: {bin_path}")]
    CompilerNotFound {
        /// Configured binary path
        bin_path: String,
    },

    /// The compiler exited with a non-zero status
    ///
    /// `stderr` is the captured error stream, verbatim. A compiler that
    /// reports only on standard output gets its standard output here instead.
    #[error("Typst compilation failed: {stderr}")]
    CompilationError {
        /// Process exit code, `None` when terminated by a signal
        exit_code: Option<i32>,
        /// Captured standard error, or standard output when stderr was empty
        stderr: String,
    },

    /// Compiled artifact missing or unreadable
    #[error("Failed to read compiled output file {}: {reason}", path.display())]
    OutputReadError {
        /// Expected artifact path
        path: PathBuf,
        /// Why the artifact could not be read
        reason: String,
    },

    /// The compiler exceeded the configured timeout and was terminated
    #[error("Typst compilation timed out after {seconds} seconds")]
    Timeout {
        /// Configured timeout
        seconds: u64,
    },

    /// Configuration file could not be parsed
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the problem
        message: String,
    },

    /// Any other failure
    ///
    /// Raised when the compiler cannot be started for a reason other than a
    /// missing binary (permissions, not an executable), when a relative
    /// output path cannot be anchored to the current directory, and by
    /// [`user_friendly_error`] for errors from outside this crate.
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

impl TypstError {
    /// Exit code of the external compiler, when this error carries one.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::CompilationError {
                exit_code,
                ..
            } => *exit_code,
            _ => None,
        }
    }
}

/// Error context wrapper that provides user-friendly error information
///
/// When displayed, errors show:
/// 1. **Error**: the main error message in red
/// 2. **Details**: additional context in yellow (optional)
/// 3. **Suggestion**: actionable steps in green (optional)
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: TypstError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: TypstError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error context to stderr with terminal colors
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions
///
/// Recognizes [`TypstError`] anywhere in the chain and [`std::io::Error`] at the
/// top; anything else is reported with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    for cause in error.chain() {
        if let Some(typst_error) = cause.downcast_ref::<TypstError>() {
            return create_error_context(typst_error.clone());
        }
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        if io_error.kind() == std::io::ErrorKind::PermissionDenied {
            return ErrorContext::new(TypstError::WorkspaceError {
                path: PathBuf::from("unknown"),
                reason: io_error.to_string(),
            })
            .with_suggestion("Check that the scratch and debug directories are writable");
        }
    }

    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(TypstError::Other {
        message,
    })
}

fn create_error_context(error: TypstError) -> ErrorContext {
    match &error {
        TypstError::InputNotFound { path } => {
            let details = format!("Looked for the entrypoint at {}", path.display());
            ErrorContext::new(error)
                .with_suggestion("Check the input path; relative paths resolve against the process working directory")
                .with_details(details)
        }

        TypstError::WorkspaceError { .. } => ErrorContext::new(error)
            .with_suggestion("Set TYPST_WORKING_DIR to a writable directory or fix the permissions of the configured one"),

        TypstError::TempFileError { .. } => ErrorContext::new(error)
            .with_suggestion("Check free disk space and write permissions of the scratch directory"),

        TypstError::RenderError { template, .. } => {
            let details = format!("Rendering failed in {template}");
            ErrorContext::new(error)
                .with_suggestion(
                    "Check template syntax: variables use {{ var }}, comments use {# #}, control flow uses {% %}. \
                     Ensure every referenced variable is present in the bindings",
                )
                .with_details(details)
        }

        TypstError::SecurityRejection { .. } => ErrorContext::new(error)
            .with_suggestion("Remove the call from the template; template expressions may only format and iterate over bindings")
            .with_details("Templates are rejected before rendering when they reference process, evaluation or filesystem functions"),

        TypstError::CompilerNotFound { bin_path } => {
            let suggestion = format!(
                "Install Typst from https://typst.app or point TYPST_BIN_PATH at the binary (currently '{bin_path}')"
            );
            ErrorContext::new(error).with_suggestion(suggestion)
        }

        TypstError::CompilationError { exit_code, .. } => {
            let details = match exit_code {
                Some(code) => format!("The compiler exited with status {code}"),
                None => "The compiler was terminated by a signal".to_string(),
            };
            ErrorContext::new(error)
                .with_suggestion("Fix the reported source location; enable debug preservation to inspect the generated files")
                .with_details(details)
        }

        TypstError::Timeout { seconds } => {
            let details = format!("The compiler was terminated after {seconds} seconds");
            ErrorContext::new(error)
                .with_suggestion("Raise TYPST_TIMEOUT or simplify the document")
                .with_details(details)
        }

        TypstError::OutputReadError { .. } => ErrorContext::new(error)
            .with_suggestion("The compiler reported success but produced no readable artifact; check the output format"),

        _ => ErrorContext::new(error),
    }
}
