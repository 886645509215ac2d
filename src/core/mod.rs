//! Core types shared by every stage of the pipeline.
//!
//! Currently this is the error taxonomy; see [`error`] for the variants and
//! the user-facing [`ErrorContext`] helpers.

pub mod error;

pub use error::{ErrorContext, TypstError, user_friendly_error};

/// Result alias for fallible pipeline operations.
pub type Result<T, E = TypstError> = std::result::Result<T, E>;
