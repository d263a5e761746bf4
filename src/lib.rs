//! mdimport - import resolution for markdown documents
//!
//! mdimport expands inline directives in a markdown document into the content
//! they reference, producing a single self-contained document suitable as an
//! LLM prompt. Directives are only recognized outside code spans and code
//! blocks.
//!
//! # Directive Forms
//!
//! | Form | Result |
//! |---|---|
//! | `@./notes.md`, `@~/notes.md`, `@/abs/notes.md` | file content, expanded recursively |
//! | `@./src/**/*.ts` | every matching text file, each wrapped in a tag |
//! | `@./api.ts#User` | the declaration of `User` |
//! | `@./main.rs:10-20` | lines 10 to 20 |
//! | `@https://host/doc.md` | fetched body (markdown, text or JSON), cached |
//! | `` !`git log -1` `` | command stdout |
//! | fenced block starting with `#!` | script stdout |
//!
//! # Architecture Overview
//!
//! ```text
//! text ──► markdown::scanner ──► markdown::parser ──► Vec<ImportAction>
//!                                                        │
//!                 imports::resolver (throttled, concurrent)
//!                   │  env::ExecutionEnvironment (fs, http, processes)
//!                   │  cache::ContentCache (URL bodies)
//!                   ▼
//!              Vec<ResolvedImport> ──► imports::expander (recurse + splice)
//!                                                        │
//!                                          tokens::TokenBudget ──► String
//! ```
//!
//! # Core Modules
//!
//! - [`markdown`] - Safe-range scanning and directive parsing
//! - [`imports`] - Import actions, resolution, cycle guard and expansion
//! - [`env`] - The I/O capability trait and its system implementation
//! - [`cache`] - File-backed URL content cache with conditional revalidation
//! - [`tokens`] - Token counting and the size budget for expanded documents
//!
//! ## Supporting Modules
//! - [`cli`] - Command-line interface
//! - [`config`] - User configuration and cache directory resolution
//! - [`constants`] - Defaults and thresholds
//! - [`core`] - Error types and user-facing error rendering
//! - [`pattern`] - Filesystem glob matching
//! - [`utils`] - Concurrency throttle and file helpers
//!
//! # Example
//!
//! ```rust,no_run
//! use mdimport::env::SystemEnvironment;
//! use mdimport::imports::{ExpandOptions, Expander};
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let expander = Expander::new(SystemEnvironment::new()?, ExpandOptions::default())?;
//! let prompt = expander.expand_file(Path::new("prompt.md")).await?;
//! println!("{prompt}");
//! # Ok(())
//! # }
//! ```

// Core functionality modules
pub mod cache;
pub mod env;
pub mod imports;
pub mod markdown;
pub mod tokens;

// Supporting modules
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod pattern;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
