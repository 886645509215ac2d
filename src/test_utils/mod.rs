//! Test utilities for typst-prep
//!
//! This module provides logging setup for tests and a project fixture with a
//! fake compiler, so the full pipeline can be exercised without a Typst binary.
//!
//! # Example
//!
//! ```rust,no_run
//! use typst_prep::test_utils::{FakeCompiler, TestProject};
//!
//! # fn example() -> anyhow::Result<()> {
//! let project = TestProject::new()?;
//! project.write("docs/Styles.typ", "#let x = 1")?;
//! project.install_compiler(&FakeCompiler::Echo)?;
//! let config = project.config();
//! # Ok(())
//! # }
//! ```

pub mod fixtures;

pub use fixtures::{FakeCompiler, TestProject};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. Uses `level` when given, else
/// `RUST_LOG`; with neither, logging stays off.
///
/// ```bash
/// RUST_LOG=typst::resolver=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true) // Show targets like "typst::resolver"
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}
