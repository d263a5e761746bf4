//! `mdimport cache`

use crate::cache::ContentCache;
use crate::config::GlobalConfig;
use crate::core::ImportError;
use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

/// Manage the URL content cache.
#[derive(Args, Debug)]
pub struct CacheCommand {
    #[command(subcommand)]
    action: CacheAction,
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Print the cache directory.
    Path,
    /// Remove every cached entry.
    Clear,
    /// Remove entries past their TTL.
    Sweep,
    /// Remove the entry for one URL.
    Invalidate {
        /// URL whose entry should be dropped
        url: String,
    },
}

impl CacheCommand {
    pub async fn execute(self, config: &GlobalConfig) -> Result<()> {
        let cache = ContentCache::open_default(config.cache_ttl()).map_err(|e| ImportError::Cache {
            path: "cache directory".to_string(),
            reason: format!("{e:#}"),
        })?;
        let cache_error = |e: anyhow::Error| ImportError::Cache {
            path: cache.cache_dir().display().to_string(),
            reason: format!("{e:#}"),
        };

        match self.action {
            CacheAction::Path => println!("{}", cache.cache_dir().display()),
            CacheAction::Clear => {
                let removed = cache.clear().await.map_err(cache_error)?;
                println!("{} Removed {removed} cached entr{}", "✓".green(), plural(removed));
            }
            CacheAction::Sweep => {
                let removed = cache.sweep_expired().await.map_err(cache_error)?;
                println!("{} Removed {removed} expired entr{}", "✓".green(), plural(removed));
            }
            CacheAction::Invalidate {
                url,
            } => {
                if cache.invalidate(&url).await.map_err(cache_error)? {
                    println!("{} Invalidated {url}", "✓".green());
                } else {
                    println!("{} No cached entry for {url}", "!".yellow());
                }
            }
        }
        Ok(())
    }
}

const fn plural(count: usize) -> &'static str {
    if count == 1 { "y" } else { "ies" }
}
