//! In-memory [`ExecutionEnvironment`] for tests.

use crate::env::{
    CommandOutput, ExecRequest, ExecutionEnvironment, FetchRequest, FetchResponse, GlobMatch,
};
use crate::pattern::{PatternMatcher, display_path, split_literal_prefix};
use crate::utils::fs::looks_binary;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A canned URL response.
#[derive(Debug, Clone, Default)]
pub struct MemoryResponse {
    /// Body
    pub content: String,
    /// `Content-Type` header
    pub content_type: Option<String>,
    /// `ETag` header; a request carrying the same value gets `304`
    pub etag: Option<String>,
}

/// Files, URLs and command outputs held in memory.
///
/// Paths are normalized lexically (`.` and `..` removed), so
/// `/docs/./a.md` and `/docs/sub/../a.md` name the same file. Every I/O
/// call is counted so tests can assert on concurrency, and every
/// [`log`](ExecutionEnvironment::log) line is recorded.
#[derive(Debug, Default)]
pub struct MemoryEnvironment {
    files: BTreeMap<PathBuf, Vec<u8>>,
    urls: HashMap<String, MemoryResponse>,
    commands: HashMap<String, CommandOutput>,
    home: Option<PathBuf>,
    latency: Option<Duration>,
    logs: Mutex<Vec<String>>,
    fetches: Mutex<Vec<FetchRequest>>,
    execs: Mutex<Vec<ExecRequest>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl MemoryEnvironment {
    /// An empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text file.
    #[must_use]
    pub fn with_file(self, path: impl AsRef<Path>, content: &str) -> Self {
        self.with_bytes(path, content.as_bytes().to_vec())
    }

    /// Add a file with arbitrary bytes.
    #[must_use]
    pub fn with_bytes(mut self, path: impl AsRef<Path>, bytes: Vec<u8>) -> Self {
        self.files.insert(normalize(path.as_ref()), bytes);
        self
    }

    /// Serve `content` at `url` with the given content type.
    #[must_use]
    pub fn with_url(self, url: &str, content: &str, content_type: Option<&str>) -> Self {
        self.with_response(
            url,
            MemoryResponse {
                content: content.to_string(),
                content_type: content_type.map(str::to_string),
                etag: None,
            },
        )
    }

    /// Serve a full canned response at `url`.
    #[must_use]
    pub fn with_response(mut self, url: &str, response: MemoryResponse) -> Self {
        self.urls.insert(url.to_string(), response);
        self
    }

    /// Answer a shell command, or a script with exactly this code.
    #[must_use]
    pub fn with_command(mut self, command: &str, output: CommandOutput) -> Self {
        self.commands.insert(command.to_string(), output);
        self
    }

    /// Answer a command with `stdout` and exit status 0.
    #[must_use]
    pub fn with_command_stdout(self, command: &str, stdout: &str) -> Self {
        self.with_command(
            command,
            CommandOutput {
                stdout: stdout.to_string(),
                stderr: String::new(),
                status: Some(0),
            },
        )
    }

    /// Home directory used for `~` paths.
    #[must_use]
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    /// Delay every I/O call, so concurrent calls overlap.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Lines passed to `log`, in call order.
    #[must_use]
    pub fn logs(&self) -> Vec<String> {
        self.logs.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Every fetch request received.
    #[must_use]
    pub fn fetch_requests(&self) -> Vec<FetchRequest> {
        self.fetches.lock().map(|f| f.clone()).unwrap_or_default()
    }

    /// Every exec request received.
    #[must_use]
    pub fn exec_requests(&self) -> Vec<ExecRequest> {
        self.execs.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Highest number of I/O calls observed in flight at once.
    #[must_use]
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn simulate_io(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn file(&self, path: &Path) -> Result<&Vec<u8>> {
        self.files
            .get(&normalize(path))
            .ok_or_else(|| anyhow!("No such file: {}", path.display()))
    }
}

/// Lexically remove `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[async_trait]
impl ExecutionEnvironment for MemoryEnvironment {
    async fn file_exists(&self, path: &Path) -> bool {
        self.files.contains_key(&normalize(path))
    }

    async fn is_binary(&self, path: &Path) -> Result<bool> {
        Ok(looks_binary(self.file(path)?))
    }

    async fn read_text(&self, path: &Path) -> Result<String> {
        self.simulate_io().await;
        Ok(String::from_utf8(self.file(path)?.clone())?)
    }

    async fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        self.file(path)?;
        Ok(normalize(path))
    }

    async fn expand_glob(&self, pattern: &str, cwd: &Path) -> Result<Vec<GlobMatch>> {
        self.simulate_io().await;
        let (prefix, glob) = split_literal_prefix(pattern);
        let base = match prefix {
            "" => normalize(cwd),
            p if p.starts_with('~') => normalize(
                &self.home.clone().unwrap_or_default().join(p.trim_start_matches(['~', '/'])),
            ),
            p => normalize(&cwd.join(p)),
        };
        let matcher = PatternMatcher::new(glob)?;

        let mut matches = Vec::new();
        for (path, bytes) in &self.files {
            let Ok(relative) = path.strip_prefix(&base) else {
                continue;
            };
            if !matcher.matches(relative) {
                continue;
            }
            if looks_binary(bytes) {
                self.log(&format!("Skipping binary file {}", path.display()));
                continue;
            }
            matches.push(GlobMatch {
                path: display_path(prefix, relative),
                content: String::from_utf8(bytes.clone())?,
            });
        }
        Ok(matches)
    }

    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        self.simulate_io().await;
        if let Ok(mut fetches) = self.fetches.lock() {
            fetches.push(request.clone());
        }

        let response =
            self.urls.get(&request.url).ok_or_else(|| anyhow!("HTTP 404 Not Found"))?;
        if request.etag.is_some() && request.etag == response.etag {
            return Ok(FetchResponse::NotModified {
                etag: response.etag.clone(),
                last_modified: None,
            });
        }
        Ok(FetchResponse::Fetched {
            content: response.content.clone(),
            content_type: response.content_type.clone(),
            etag: response.etag.clone(),
            last_modified: None,
        })
    }

    async fn exec(&self, request: ExecRequest, _cwd: &Path) -> Result<CommandOutput> {
        self.simulate_io().await;
        if let Ok(mut execs) = self.execs.lock() {
            execs.push(request.clone());
        }

        let key = match &request {
            ExecRequest::Shell(command) => command,
            ExecRequest::Script {
                code, ..
            } => code,
        };
        self.commands.get(key).cloned().ok_or_else(|| anyhow!("command not found: {key}"))
    }

    fn log(&self, message: &str) {
        if let Ok(mut logs) = self.logs.lock() {
            logs.push(message.to_string());
        }
    }

    fn home_dir(&self) -> Option<PathBuf> {
        self.home.clone()
    }
}
