//! Invocation of the external Typst compiler.

pub mod command;

pub use command::{TypstCommand, TypstCommandOutput};
