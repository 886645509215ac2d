//! Configuration management for typst-prep.
//!
//! See [`settings`] for the configuration fields, their defaults and the
//! validation applied to partial updates.

mod settings;

pub use settings::{ConfigUpdate, TimeoutSetting, TypstConfig};
