//! Test utilities for mdimport
//!
//! This module provides an in-memory [`MemoryEnvironment`] implementing the
//! same capability surface as the real filesystem, network and process
//! layer, plus a once-only logging initializer for tests.
//!
//! # Example
//!
//! ```rust,no_run
//! use mdimport::imports::{ExpandOptions, Expander};
//! use mdimport::test_utils::MemoryEnvironment;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), mdimport::core::ImportError> {
//! let env = MemoryEnvironment::new().with_file("/docs/intro.md", "Hello");
//! let expander = Expander::new(env, ExpandOptions::default())?;
//!
//! let out = expander.expand("Intro: @./intro.md", Path::new("/docs")).await?;
//! assert_eq!(out, "Intro: Hello");
//! # Ok(())
//! # }
//! ```

pub mod memory_env;

pub use memory_env::{MemoryEnvironment, MemoryResponse};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. It respects the `RUST_LOG` environment
/// variable if set, or uses the provided log level.
///
/// ```bash
/// RUST_LOG=import=debug cargo test
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
            .with_target(true) // Show targets like "import" and "cache"
            .with_thread_ids(false)
            .try_init();
    });
}
