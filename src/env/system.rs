//! Real filesystem, network and process access.

use super::{CommandOutput, ExecRequest, ExecutionEnvironment, FetchRequest, FetchResponse, GlobMatch};
use crate::constants::{BINARY_SNIFF_LEN, DEFAULT_COMMAND_TIMEOUT};
use crate::pattern::{PatternMatcher, display_path, split_literal_prefix};
use crate::utils::fs::looks_binary;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{
    CONTENT_TYPE, ETAG, HeaderName, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;
use tokio_retry::RetryIf;
use tokio_retry::strategy::ExponentialBackoff;

/// Attempts per fetch, first try included.
const FETCH_ATTEMPTS: usize = 3;

/// Environment backed by `tokio::fs`, `reqwest` and `tokio::process`.
#[derive(Debug, Clone)]
pub struct SystemEnvironment {
    client: reqwest::Client,
    command_timeout: Option<Duration>,
}

impl SystemEnvironment {
    /// Create an environment with the default command timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to initialize HTTP client")?;
        Ok(Self {
            client,
            command_timeout: Some(DEFAULT_COMMAND_TIMEOUT),
        })
    }

    /// Set the per-command timeout. `None` lets commands run indefinitely.
    #[must_use]
    pub const fn with_command_timeout(mut self, command_timeout: Option<Duration>) -> Self {
        self.command_timeout = command_timeout;
        self
    }

    fn resolve_prefix(&self, prefix: &str, cwd: &Path) -> PathBuf {
        if prefix.is_empty() {
            return cwd.to_path_buf();
        }
        let expanded = PathBuf::from(shellexpand::tilde(prefix).as_ref());
        if expanded.is_absolute() {
            expanded
        } else {
            cwd.join(expanded)
        }
    }

    async fn fetch_once(&self, request: &FetchRequest) -> Result<FetchResponse, FetchAttemptError> {
        let mut builder = self.client.get(&request.url);
        if let Some(etag) = &request.etag {
            builder = builder.header(IF_NONE_MATCH, etag);
        }
        if let Some(last_modified) = &request.last_modified {
            builder = builder.header(IF_MODIFIED_SINCE, last_modified);
        }

        let response = builder.send().await.map_err(|e| FetchAttemptError {
            retriable: e.is_connect() || e.is_timeout(),
            message: e.to_string(),
        })?;

        let status = response.status();
        let header = |name: HeaderName| {
            response.headers().get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
        };
        let etag = header(ETAG);
        let last_modified = header(LAST_MODIFIED);
        let content_type = header(CONTENT_TYPE);

        if status == StatusCode::NOT_MODIFIED {
            return Ok(FetchResponse::NotModified {
                etag,
                last_modified,
            });
        }
        if !status.is_success() {
            return Err(FetchAttemptError {
                retriable: status.is_server_error(),
                message: format!("HTTP {status}"),
            });
        }

        let content = response.text().await.map_err(|e| FetchAttemptError {
            retriable: false,
            message: format!("Failed to read response body: {e}"),
        })?;
        Ok(FetchResponse::Fetched {
            content,
            content_type,
            etag,
            last_modified,
        })
    }
}

/// A single failed fetch attempt.
#[derive(Debug)]
struct FetchAttemptError {
    message: String,
    retriable: bool,
}

fn shell_command(command: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    }
}

#[async_trait]
impl ExecutionEnvironment for SystemEnvironment {
    async fn file_exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn is_binary(&self, path: &Path) -> Result<bool> {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let mut head = Vec::with_capacity(BINARY_SNIFF_LEN);
        file.take(BINARY_SNIFF_LEN as u64)
            .read_to_end(&mut head)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(looks_binary(&head))
    }

    async fn read_text(&self, path: &Path) -> Result<String> {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }

    async fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        tokio::fs::canonicalize(path)
            .await
            .with_context(|| format!("Failed to canonicalize {}", path.display()))
    }

    async fn expand_glob(&self, pattern: &str, cwd: &Path) -> Result<Vec<GlobMatch>> {
        let (prefix, glob) = split_literal_prefix(pattern);
        let base = self.resolve_prefix(prefix, cwd);
        let matcher = PatternMatcher::new(glob)?;

        let walk_base = base.clone();
        let relative_paths = tokio::task::spawn_blocking(move || matcher.find_matches(&walk_base))
            .await
            .context("Glob expansion task failed")??;

        let mut matches = Vec::with_capacity(relative_paths.len());
        for relative in relative_paths {
            let path = base.join(&relative);
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            if looks_binary(&bytes) {
                self.log(&format!("Skipping binary file {}", path.display()));
                continue;
            }
            let content = String::from_utf8(bytes)
                .with_context(|| format!("{} is not valid UTF-8", path.display()))?;
            matches.push(GlobMatch {
                path: display_path(prefix, &relative),
                content,
            });
        }
        Ok(matches)
    }

    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        let strategy = ExponentialBackoff::from_millis(10)
            .max_delay(Duration::from_millis(500))
            .factor(2)
            .take(FETCH_ATTEMPTS - 1);

        RetryIf::spawn(
            strategy,
            || self.fetch_once(&request),
            |e: &FetchAttemptError| {
                if e.retriable {
                    tracing::debug!(target: "import", "Retrying {}: {}", request.url, e.message);
                }
                e.retriable
            },
        )
        .await
        .map_err(|e| anyhow!("{}", e.message))
    }

    async fn exec(&self, request: ExecRequest, cwd: &Path) -> Result<CommandOutput> {
        // The script file must outlive the child process.
        let (mut cmd, label, _script) = match request {
            ExecRequest::Shell(command) => (shell_command(&command), command, None),
            ExecRequest::Script {
                interpreter,
                code,
            } => {
                let mut file = tempfile::Builder::new()
                    .prefix("mdimport-")
                    .suffix(".script")
                    .tempfile()
                    .context("Failed to create script file")?;
                file.write_all(code.as_bytes()).context("Failed to write script file")?;
                file.flush().context("Failed to write script file")?;
                let script = file.into_temp_path();

                let mut parts = interpreter.split_whitespace();
                let program =
                    parts.next().ok_or_else(|| anyhow!("Shebang names no interpreter"))?;
                let mut cmd = Command::new(program);
                cmd.args(parts).arg(&script);
                (cmd, interpreter, Some(script))
            }
        };

        cmd.current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        tracing::debug!(target: "import", "Executing in {}: {label}", cwd.display());

        let output_future = cmd.output();
        let output = match self.command_timeout {
            Some(duration) => timeout(duration, output_future).await.map_err(|_| {
                tracing::warn!(
                    target: "import",
                    "Command timed out after {} seconds: {label}",
                    duration.as_secs()
                );
                anyhow!("timed out after {} seconds", duration.as_secs())
            })?,
            None => output_future.await,
        }
        .with_context(|| format!("Failed to spawn {label}"))?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            status: output.status.code(),
        })
    }

    fn log(&self, message: &str) {
        tracing::debug!(target: "import", "{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_operations() {
        let temp = TempDir::new().unwrap();
        let text = temp.path().join("a.md");
        let binary = temp.path().join("b.bin");
        std::fs::write(&text, "hello").unwrap();
        std::fs::write(&binary, [0x89, b'P', 0, 1]).unwrap();
        let env = SystemEnvironment::new().unwrap();

        assert!(env.file_exists(&text).await);
        assert!(!env.file_exists(&temp.path().join("missing.md")).await);
        assert!(!env.is_binary(&text).await.unwrap());
        assert!(env.is_binary(&binary).await.unwrap());
        assert_eq!(env.read_text(&text).await.unwrap(), "hello");
        assert!(env.canonicalize(&text).await.unwrap().is_absolute());
    }

    #[tokio::test]
    async fn test_expand_glob_skips_binaries() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("docs")).unwrap();
        std::fs::write(temp.path().join("docs/b.md"), "beta").unwrap();
        std::fs::write(temp.path().join("docs/a.md"), "alpha").unwrap();
        std::fs::write(temp.path().join("docs/c.md"), [0u8, 1, 2]).unwrap();
        let env = SystemEnvironment::new().unwrap();

        let matches = env.expand_glob("./docs/*.md", temp.path()).await.unwrap();

        assert_eq!(
            matches,
            vec![
                GlobMatch {
                    path: "./docs/a.md".to_string(),
                    content: "alpha".to_string()
                },
                GlobMatch {
                    path: "./docs/b.md".to_string(),
                    content: "beta".to_string()
                },
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_shell_and_script() {
        let temp = TempDir::new().unwrap();
        let env = SystemEnvironment::new().unwrap();

        let output =
            env.exec(ExecRequest::Shell("echo hi; exit 3".to_string()), temp.path()).await.unwrap();
        assert_eq!(output.stdout, "hi\n");
        assert_eq!(output.status, Some(3));
        assert!(!output.success());

        let output = env
            .exec(
                ExecRequest::Script {
                    interpreter: "/bin/sh".to_string(),
                    code: "#!/bin/sh\npwd\n".to_string(),
                },
                temp.path(),
            )
            .await
            .unwrap();
        assert!(output.success());
        let reported = PathBuf::from(output.stdout.trim_end());
        assert_eq!(reported.canonicalize().unwrap(), temp.path().canonicalize().unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_timeout() {
        let temp = TempDir::new().unwrap();
        let env = SystemEnvironment::new()
            .unwrap()
            .with_command_timeout(Some(Duration::from_millis(100)));

        let err = env.exec(ExecRequest::Shell("sleep 5".to_string()), temp.path()).await.unwrap_err();
        assert!(format!("{err:#}").contains("timed out"));
    }
}
