//! `mdimport parse`

use super::read_input;
use crate::markdown::parse_imports;
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

/// Print the import actions of a document as JSON.
#[derive(Args, Debug)]
pub struct ParseCommand {
    /// Markdown file to parse, or `-` for stdin.
    #[arg(value_name = "FILE")]
    pub input: PathBuf,
}

impl ParseCommand {
    pub async fn execute(self) -> Result<()> {
        let text = read_input(&self.input).await?;
        let actions = parse_imports(&text);
        let json = serde_json::to_string_pretty(&actions).context("Failed to serialize actions")?;
        println!("{json}");
        Ok(())
    }
}
