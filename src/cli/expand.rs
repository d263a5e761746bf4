//! `mdimport expand`

use super::read_input;
use crate::cache::ContentCache;
use crate::config::GlobalConfig;
use crate::core::ImportError;
use crate::env::SystemEnvironment;
use crate::imports::{ExpandOptions, Expander};
use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};

/// Expand a document and print the result.
#[derive(Args, Debug)]
pub struct ExpandCommand {
    /// Markdown file to expand, or `-` for stdin.
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Ignore cached URL bodies (fresh bodies are still cached).
    #[arg(long)]
    pub no_cache: bool,

    /// Warn instead of failing when the result exceeds the token maximum.
    #[arg(long)]
    pub allow_large: bool,

    /// Maximum concurrent resolutions (default from config).
    #[arg(long, value_name = "N")]
    pub max_parallel: Option<usize>,

    /// Write the result to a file instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

impl ExpandCommand {
    pub async fn execute(self, config: &GlobalConfig) -> Result<()> {
        let env = SystemEnvironment::new()?.with_command_timeout(config.command_timeout());
        let cache = ContentCache::open_default(config.cache_ttl()).map_err(|e| {
            ImportError::Cache {
                path: "cache directory".to_string(),
                reason: format!("{e:#}"),
            }
        })?;
        let options = ExpandOptions {
            max_parallel: self.max_parallel.unwrap_or(config.max_parallel),
            bypass_cache: self.no_cache,
            budget: Some(config.token_budget().with_allow_exceed(self.allow_large)),
        };
        let expander = Expander::new(env, options)?.with_cache(cache);

        let expanded = if self.input == Path::new("-") {
            let text = read_input(&self.input).await?;
            let cwd = std::env::current_dir().context("Failed to determine current directory")?;
            expander.expand(&text, &cwd).await?
        } else {
            expander.expand_file(&self.input).await?
        };

        match &self.output {
            Some(path) => tokio::fs::write(path, &expanded)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?,
            None => print!("{expanded}"),
        }
        Ok(())
    }
}
