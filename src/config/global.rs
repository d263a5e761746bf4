//! User-wide configuration file.
//!
//! Every field is optional in the file. Unknown keys are rejected so a typo
//! doesn't silently fall back to a default.

use crate::constants::{
    DEFAULT_CACHE_TTL, DEFAULT_COMMAND_TIMEOUT, DEFAULT_MAX_TOKENS, DEFAULT_WARN_TOKENS,
    default_parallelism,
};
use crate::tokens::TokenBudget;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Global configuration loaded from `config.toml`.
///
/// # Examples
///
/// ```rust
/// use mdimport::config::GlobalConfig;
///
/// let config: GlobalConfig = toml::from_str("max_parallel = 3\n[tokens]\nmax_threshold = 1000\n").unwrap();
/// assert_eq!(config.max_parallel, 3);
/// assert_eq!(config.tokens.max_threshold, 1000);
/// assert_eq!(config.cache_ttl_secs, 3600);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Concurrent resolutions across a whole expansion.
    pub max_parallel: usize,

    /// Freshness window for cached URL bodies, in seconds.
    pub cache_ttl_secs: u64,

    /// Per-command timeout in seconds. `0` disables the timeout.
    pub command_timeout_secs: u64,

    /// Token budget thresholds.
    pub tokens: TokenConfig,
}

/// `[tokens]` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TokenConfig {
    /// Tokens above which a warning is logged
    pub warn_threshold: usize,
    /// Tokens above which expansion fails
    pub max_threshold: usize,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            max_parallel: default_parallelism(),
            cache_ttl_secs: DEFAULT_CACHE_TTL.as_secs(),
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT.as_secs(),
            tokens: TokenConfig::default(),
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            warn_threshold: DEFAULT_WARN_TOKENS,
            max_threshold: DEFAULT_MAX_TOKENS,
        }
    }
}

impl GlobalConfig {
    /// Load from the default location, or defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load() -> Result<Self> {
        Self::load_with_optional(None).await
    }

    /// Load from `path` when given, else from [`Self::default_path`].
    ///
    /// A missing file is not an error in either case.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => Self::default_path()?,
        };
        if path.exists() {
            Self::load_from(&path).await
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// contains unknown keys.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// `MDIMPORT_CONFIG_PATH`, else `config.toml` in the mdimport directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os("MDIMPORT_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }
        Ok(super::base_dir()?.join("config.toml"))
    }

    /// Token budget built from the `[tokens]` table.
    #[must_use]
    pub const fn token_budget(&self) -> TokenBudget {
        TokenBudget::new(self.tokens.warn_threshold, self.tokens.max_threshold)
    }

    /// Cache freshness window.
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Command timeout, or `None` when disabled.
    #[must_use]
    pub const fn command_timeout(&self) -> Option<Duration> {
        if self.command_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.command_timeout_secs))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = GlobalConfig::default();
        assert!(config.max_parallel >= 10);
        assert_eq!(config.cache_ttl(), Duration::from_secs(3600));
        assert_eq!(config.command_timeout(), Some(Duration::from_secs(60)));
        assert_eq!(config.token_budget(), TokenBudget::new(50_000, 150_000));
    }

    #[tokio::test]
    async fn test_load_from_partial_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "command_timeout_secs = 0\n[tokens]\nwarn_threshold = 10\n").unwrap();

        let config = GlobalConfig::load_from(&path).await.unwrap();
        assert_eq!(config.command_timeout(), None);
        assert_eq!(config.tokens.warn_threshold, 10);
        assert_eq!(config.tokens.max_threshold, DEFAULT_MAX_TOKENS);
    }

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config =
            GlobalConfig::load_with_optional(Some(temp.path().join("absent.toml"))).await.unwrap();
        assert_eq!(config, GlobalConfig::default());
    }

    #[tokio::test]
    async fn test_unknown_key_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "max_paralel = 3\n").unwrap();

        let err = GlobalConfig::load_from(&path).await.unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config"));
    }
}
