//! Command-line interface for mdimport.
//!
//! # Available Commands
//!
//! - `expand` - Expand every import directive in a document and print the result
//! - `parse` - Print the import actions found in a document as JSON
//! - `cache` - Inspect or prune the URL content cache
//!
//! # Usage
//!
//! ```bash
//! # Expand a prompt file
//! mdimport expand prompt.md
//!
//! # Expand stdin, ignoring cached URL bodies, writing to a file
//! cat prompt.md | mdimport expand - --no-cache -o out.md
//!
//! # See what would be imported
//! mdimport parse prompt.md
//!
//! # Drop expired cache entries
//! mdimport cache sweep
//! ```
//!
//! # Global Options
//!
//! - `--verbose` / `-v`: log every resolved import to stderr
//! - `--quiet` / `-q`: only log errors
//! - `--config` / `-c`: use a specific configuration file
//!
//! Logging goes to stderr so the expanded document on stdout can be piped.

mod cache;
mod expand;
mod parse;

use crate::config::GlobalConfig;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

/// Expand import directives in markdown documents.
#[derive(Parser, Debug)]
#[command(
    name = "mdimport",
    about = "Expand file, URL and command imports in markdown documents",
    version,
    long_about = "mdimport resolves @file, @glob, @file#Symbol, @file:1-10, @https://..., !`command` \
                  and executable code fence directives and splices their content into the document."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log each import as it is resolved.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the configuration file (default: `~/.mdimport/config.toml`).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Expand a document and print the result.
    Expand(expand::ExpandCommand),

    /// Print the import actions of a document as JSON.
    Parse(parse::ParseCommand),

    /// Manage the URL content cache.
    Cache(cache::CacheCommand),
}

impl Cli {
    /// Run the parsed command.
    ///
    /// # Errors
    ///
    /// Returns the command's error; the binary renders it with
    /// [`crate::core::user_friendly_error`].
    pub async fn execute(self) -> Result<()> {
        init_logging(self.verbose, self.quiet);
        let config = GlobalConfig::load_with_optional(self.config).await?;

        match self.command {
            Commands::Expand(cmd) => cmd.execute(&config).await,
            Commands::Parse(cmd) => cmd.execute().await,
            Commands::Cache(cmd) => cmd.execute(&config).await,
        }
    }
}

/// Install the stderr subscriber.
///
/// `RUST_LOG` wins when set; otherwise `--verbose` selects `debug`,
/// `--quiet` selects `error` and the default is `warn`.
fn init_logging(verbose: bool, quiet: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .without_time()
        .try_init();
}

/// Read `input`, or stdin when it is `-`.
async fn read_input(input: &Path) -> Result<String> {
    use anyhow::Context;

    if input == Path::new("-") {
        let mut text = String::new();
        tokio::io::stdin().read_to_string(&mut text).await.context("Failed to read stdin")?;
        return Ok(text);
    }
    tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))
}
