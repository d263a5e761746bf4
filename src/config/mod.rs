//! Configuration management for mdimport
//!
//! mdimport reads a single optional user-wide TOML file and resolves where the
//! URL content cache lives. Nothing is required: a missing file yields the
//! built-in defaults.
//!
//! # Configuration File
//!
//! **Location:**
//! - Unix/macOS: `~/.mdimport/config.toml`
//! - Windows: `%LOCALAPPDATA%\mdimport\config.toml`
//! - Override: `MDIMPORT_CONFIG_PATH` or the `--config` flag
//!
//! ```toml
//! # Concurrent resolutions (default: max(10, 2 x cores))
//! max_parallel = 16
//!
//! # Seconds a fetched URL stays fresh
//! cache_ttl_secs = 3600
//!
//! # Seconds before an inline command or fence is killed (0 disables)
//! command_timeout_secs = 60
//!
//! [tokens]
//! warn_threshold = 50000
//! max_threshold = 150000
//! ```
//!
//! # Cache Directory
//!
//! See [`get_cache_dir`]. The `MDIMPORT_CACHE_DIR` override exists mainly so
//! tests and CI can isolate the cache.

mod global;

pub use global::{GlobalConfig, TokenConfig};

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Get the cache directory for mdimport.
///
/// # Location Priority
///
/// 1. `MDIMPORT_CACHE_DIR` environment variable (if set)
/// 2. Platform-specific directory:
///    - Windows: `%LOCALAPPDATA%\mdimport\cache`
///    - macOS/Linux: `~/.mdimport/cache`
///
/// The directory is created if it doesn't exist.
///
/// # Examples
///
/// ```rust,no_run
/// use mdimport::config::get_cache_dir;
///
/// # fn example() -> anyhow::Result<()> {
/// let cache = get_cache_dir()?;
/// println!("Cache directory: {}", cache.display());
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined or the
/// directory cannot be created.
pub fn get_cache_dir() -> Result<PathBuf> {
    let cache_dir = match std::env::var_os("MDIMPORT_CACHE_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => base_dir()?.join("cache"),
    };

    if !cache_dir.exists() {
        std::fs::create_dir_all(&cache_dir).with_context(|| {
            format!("Failed to create cache directory: {}", cache_dir.display())
        })?;
    }

    Ok(cache_dir)
}

/// `~/.mdimport`, or `%LOCALAPPDATA%\mdimport` on Windows.
pub(crate) fn base_dir() -> Result<PathBuf> {
    if cfg!(target_os = "windows") {
        Ok(dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
            .join("mdimport"))
    } else {
        Ok(dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
            .join(".mdimport"))
    }
}
