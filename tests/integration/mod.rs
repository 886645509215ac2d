//! Integration test suite for typst-prep
//!
//! End-to-end tests driving [`typst_prep::TypstService`] against a fake
//! compiler script, so no Typst installation is required. Tests that run the
//! compiler need a POSIX `sh` and are compiled on Unix only.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! RUST_LOG=typst=debug cargo test --test integration -- --nocapture
//! ```
//!
//! # Test Organization
//!
//! - **compile**: the three compile operations, argument vector, artifacts
//! - **config**: configuration files, environment lookup and validated updates
//! - **errors**: compiler failures, timeouts, missing binaries and outputs
//! - **imports**: import discovery, data injection and rewriting through the service
//! - **security**: template gate and rejected configuration values
//! - **workspace**: scratch cleanup, debug preservation and concurrent calls

#[path = "../common/mod.rs"]
mod common;

#[cfg(unix)]
mod compile;
mod config;
#[cfg(unix)]
mod errors;
mod imports;
#[cfg(unix)]
mod workspace;
