//! The I/O boundary of the import engine.
//!
//! Everything the resolver does to the outside world (reading files,
//! expanding globs, fetching URLs, running commands, logging) goes through
//! an [`ExecutionEnvironment`]. [`SystemEnvironment`] is the real
//! implementation; `test_utils::MemoryEnvironment` is an in-memory fake.

pub mod system;

pub use system::SystemEnvironment;

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// One file matched by a glob import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobMatch {
    /// Path as displayed in the wrapping tag
    pub path: String,
    /// File content
    pub content: String,
}

/// A URL fetch, optionally conditional on stored validators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    /// URL to fetch
    pub url: String,
    /// Sent as `If-None-Match`
    pub etag: Option<String>,
    /// Sent as `If-Modified-Since`
    pub last_modified: Option<String>,
}

impl FetchRequest {
    /// Unconditional fetch of `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// Outcome of a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResponse {
    /// A body was returned.
    Fetched {
        /// Response body
        content: String,
        /// `Content-Type` header
        content_type: Option<String>,
        /// `ETag` header
        etag: Option<String>,
        /// `Last-Modified` header
        last_modified: Option<String>,
    },
    /// The server answered `304 Not Modified`.
    NotModified {
        /// Refreshed `ETag`, if sent
        etag: Option<String>,
        /// Refreshed `Last-Modified`, if sent
        last_modified: Option<String>,
    },
}

/// What to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecRequest {
    /// A command line run through the platform shell.
    Shell(String),
    /// A script run by the interpreter named in its shebang.
    Script {
        /// Interpreter command line, e.g. `/usr/bin/env python3`
        interpreter: String,
        /// Full script text, shebang included
        code: String,
    },
}

/// Captured result of an execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
    /// Exit code, `None` if killed by a signal
    pub status: Option<i32>,
}

impl CommandOutput {
    /// Whether the process exited with code zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Capability surface used by the resolver for all I/O.
///
/// Paths passed in are already resolved (home and cwd applied).
#[async_trait]
pub trait ExecutionEnvironment: Send + Sync {
    /// Whether `path` exists.
    async fn file_exists(&self, path: &Path) -> bool;

    /// Whether the file at `path` looks binary.
    async fn is_binary(&self, path: &Path) -> Result<bool>;

    /// Read `path` as UTF-8 text.
    async fn read_text(&self, path: &Path) -> Result<String>;

    /// Canonical form of `path`, used as the cycle-guard identity.
    async fn canonicalize(&self, path: &Path) -> Result<PathBuf>;

    /// Expand `pattern` relative to `cwd`, sorted by path. Binary matches are skipped.
    async fn expand_glob(&self, pattern: &str, cwd: &Path) -> Result<Vec<GlobMatch>>;

    /// Fetch a URL.
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse>;

    /// Run a command or script in `cwd`.
    async fn exec(&self, request: ExecRequest, cwd: &Path) -> Result<CommandOutput>;

    /// Observability sink for "verb target" lines.
    fn log(&self, message: &str);

    /// Home directory for `~` paths.
    fn home_dir(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }
}
