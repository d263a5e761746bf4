//! Resolution of parsed import actions into content.
//!
//! [`Resolver::resolve_all`] dispatches every action of one parse pass
//! concurrently, each under the shared [`Throttle`], and returns the results
//! in source order regardless of completion order. The first failure is
//! returned and the remaining in-flight resolutions are dropped.
//!
//! Each routine logs a "verb target" line to the environment before doing
//! any I/O.

use super::glob_wrap::wrap_matches;
use super::symbol::extract_symbol;
use super::url::classify_content;
use super::{ExpansionStack, ImportAction, LineRange, ResolvedImport};
use crate::cache::{CacheLookup, ContentCache, EntryInfo};
use crate::core::ImportError;
use crate::env::{ExecRequest, ExecutionEnvironment, FetchRequest, FetchResponse};
use crate::utils::throttle::Throttle;
use futures::future::try_join_all;
use std::path::{Path, PathBuf};

/// Resolves actions against an [`ExecutionEnvironment`].
pub struct Resolver<'a, E> {
    env: &'a E,
    throttle: &'a Throttle,
    cache: Option<&'a ContentCache>,
    bypass_cache: bool,
}

impl<'a, E: ExecutionEnvironment> Resolver<'a, E> {
    /// A resolver without a content cache.
    #[must_use]
    pub const fn new(env: &'a E, throttle: &'a Throttle) -> Self {
        Self {
            env,
            throttle,
            cache: None,
            bypass_cache: false,
        }
    }

    /// Use `cache` for URL imports. With `bypass` set, lookups always miss
    /// but fresh bodies are still stored.
    #[must_use]
    pub const fn with_cache(mut self, cache: Option<&'a ContentCache>, bypass: bool) -> Self {
        self.cache = cache;
        self.bypass_cache = bypass;
        self
    }

    /// Resolve every action concurrently, preserving order.
    ///
    /// `cwd` is the directory relative paths resolve against and `stack`
    /// holds the files being expanded on the current chain.
    pub async fn resolve_all(
        &self,
        actions: Vec<ImportAction>,
        cwd: &Path,
        stack: &ExpansionStack,
    ) -> Result<Vec<ResolvedImport>, ImportError> {
        try_join_all(actions.into_iter().map(|action| self.resolve(action, cwd, stack))).await
    }

    /// Resolve a single action.
    pub async fn resolve(
        &self,
        action: ImportAction,
        cwd: &Path,
        stack: &ExpansionStack,
    ) -> Result<ResolvedImport, ImportError> {
        match &action {
            ImportAction::File {
                path,
                line_range: Some(range),
                ..
            } => {
                let path = self.resolve_path(path, cwd);
                let content = self.resolve_line_range(&action, &path, *range).await?;
                Ok(plain(action, content))
            }
            ImportAction::File {
                path,
                line_range: None,
                ..
            } => {
                let path = self.resolve_path(path, cwd);
                let (canonical, content) = self.resolve_file(&action, &path, stack).await?;
                Ok(ResolvedImport {
                    action,
                    content,
                    expand_from: Some(canonical),
                })
            }
            ImportAction::Symbol {
                path,
                symbol,
                ..
            } => {
                let path = self.resolve_path(path, cwd);
                let content = self.resolve_symbol(&action, &path, symbol).await?;
                Ok(plain(action, content))
            }
            ImportAction::Glob {
                pattern, ..
            } => {
                let content = self.resolve_glob(&action, pattern, cwd).await?;
                Ok(plain(action, content))
            }
            ImportAction::Url {
                url, ..
            } => {
                let content = self.resolve_url(&action, url).await?;
                Ok(plain(action, content))
            }
            ImportAction::Command {
                command, ..
            } => {
                self.env.log(&format!("Running command {command}"));
                let content =
                    self.run(&action, command, ExecRequest::Shell(command.clone()), cwd).await?;
                Ok(plain(action, content))
            }
            ImportAction::ExecutableCodeFence {
                language,
                shebang,
                code,
                ..
            } => {
                self.env.log(&format!("Executing {language} code fence"));
                let interpreter = shebang.trim_start_matches("#!").trim().to_string();
                if interpreter.is_empty() {
                    return Err(execution_error(&action, shebang, "shebang names no interpreter"));
                }
                let request = ExecRequest::Script {
                    interpreter: interpreter.clone(),
                    code: code.clone(),
                };
                let content = self.run(&action, &interpreter, request, cwd).await?;
                Ok(plain(action, content))
            }
        }
    }

    /// Apply `~`, absolute and cwd-relative path forms.
    fn resolve_path(&self, raw: &str, cwd: &Path) -> PathBuf {
        let home_relative = raw.strip_prefix("~/").or_else(|| (raw == "~").then_some(""));
        if let (Some(rest), Some(home)) = (home_relative, self.env.home_dir()) {
            return home.join(rest);
        }
        let path = Path::new(raw);
        if path.is_absolute() { path.to_path_buf() } else { cwd.join(path) }
    }

    /// Existence, binary check and read, shared by the file-based routines.
    async fn read_checked(&self, action: &ImportAction, path: &Path) -> Result<String, ImportError> {
        if !self.env.file_exists(path).await {
            return Err(ImportError::FileNotFound {
                path: path.display().to_string(),
                directive: action.original().to_string(),
                index: action.index(),
            });
        }
        if self.env.is_binary(path).await.map_err(|e| io_error(action, path, &e))? {
            return Err(ImportError::BinaryFile {
                path: path.display().to_string(),
                directive: action.original().to_string(),
                index: action.index(),
            });
        }
        self.env.read_text(path).await.map_err(|e| io_error(action, path, &e))
    }

    async fn resolve_line_range(
        &self,
        action: &ImportAction,
        path: &Path,
        range: LineRange,
    ) -> Result<String, ImportError> {
        self.env.log(&format!("Reading {} lines {}-{}", path.display(), range.start, range.end));
        self.throttle
            .run(async { Ok(range.slice(&self.read_checked(action, path).await?)) })
            .await
    }

    async fn resolve_file(
        &self,
        action: &ImportAction,
        path: &Path,
        stack: &ExpansionStack,
    ) -> Result<(PathBuf, String), ImportError> {
        self.env.log(&format!("Reading {}", path.display()));
        self.throttle
            .run(async {
                if !self.env.file_exists(path).await {
                    return Err(ImportError::FileNotFound {
                        path: path.display().to_string(),
                        directive: action.original().to_string(),
                        index: action.index(),
                    });
                }
                let canonical =
                    self.env.canonicalize(path).await.map_err(|e| io_error(action, path, &e))?;
                if stack.contains(&canonical) {
                    return Err(ImportError::CircularImport {
                        chain: stack.chain_with(&canonical),
                        directive: action.original().to_string(),
                        index: action.index(),
                    });
                }
                let content = self.read_checked(action, &canonical).await?;
                Ok((canonical, content))
            })
            .await
    }

    async fn resolve_symbol(
        &self,
        action: &ImportAction,
        path: &Path,
        symbol: &str,
    ) -> Result<String, ImportError> {
        self.env.log(&format!("Extracting {symbol} from {}", path.display()));
        let content = self.throttle.run(self.read_checked(action, path)).await?;
        extract_symbol(&content, symbol).ok_or_else(|| ImportError::SymbolNotFound {
            symbol: symbol.to_string(),
            path: path.display().to_string(),
            directive: action.original().to_string(),
            index: action.index(),
        })
    }

    async fn resolve_glob(
        &self,
        action: &ImportAction,
        pattern: &str,
        cwd: &Path,
    ) -> Result<String, ImportError> {
        self.env.log(&format!("Expanding glob {pattern}"));
        let matches = self
            .throttle
            .run(async {
                self.env
                    .expand_glob(pattern, cwd)
                    .await
                    .map_err(|e| io_error(action, Path::new(pattern), &e))
            })
            .await?;
        if matches.is_empty() {
            tracing::debug!("Glob {pattern} matched no files");
        }
        Ok(wrap_matches(&matches))
    }

    async fn resolve_url(&self, action: &ImportAction, url: &str) -> Result<String, ImportError> {
        self.env.log(&format!("Fetching {url}"));

        let lookup = match self.cache {
            Some(cache) => cache.lookup(url, self.bypass_cache).await,
            None => CacheLookup::miss(),
        };
        if let Some(content) = lookup.content.as_ref().filter(|_| lookup.hit) {
            self.env.log(&format!("Using cached {url}"));
            return Ok(content.clone());
        }

        let mut request = FetchRequest::new(url);
        if let Some(metadata) = &lookup.metadata {
            request.etag = metadata.etag.clone();
            request.last_modified = metadata.last_modified.clone();
        }
        let response = self
            .throttle
            .run(async {
                self.env.fetch(request).await.map_err(|e| ImportError::Network {
                    url: url.to_string(),
                    reason: format!("{e:#}"),
                    directive: action.original().to_string(),
                    index: action.index(),
                })
            })
            .await?;

        match response {
            FetchResponse::NotModified {
                etag,
                last_modified,
            } => {
                let (Some(cache), Some(content)) = (self.cache, lookup.content) else {
                    return Err(ImportError::Network {
                        url: url.to_string(),
                        reason: "304 Not Modified without a cached body".to_string(),
                        directive: action.original().to_string(),
                        index: action.index(),
                    });
                };
                if let Err(e) = cache.touch(url, etag, last_modified).await {
                    tracing::warn!(target: "cache", "Failed to refresh cache entry for {url}: {e:#}");
                }
                Ok(content)
            }
            FetchResponse::Fetched {
                content,
                content_type,
                etag,
                last_modified,
            } => {
                classify_content(url, content_type.as_deref(), &content).map_err(
                    |rejected| ImportError::UnsupportedContentType {
                        url: url.to_string(),
                        content_type: rejected,
                        directive: action.original().to_string(),
                        index: action.index(),
                    },
                )?;
                if let Some(cache) = self.cache {
                    let info = EntryInfo {
                        etag,
                        last_modified,
                        content_type,
                    };
                    if let Err(e) = cache.set(url, &content, info, None).await {
                        tracing::warn!(target: "cache", "Failed to cache {url}: {e:#}");
                    }
                }
                Ok(content)
            }
        }
    }

    /// Execute under the throttle; a non-zero exit is logged, not raised.
    async fn run(
        &self,
        action: &ImportAction,
        label: &str,
        request: ExecRequest,
        cwd: &Path,
    ) -> Result<String, ImportError> {
        let output = self
            .throttle
            .run(async {
                self.env
                    .exec(request, cwd)
                    .await
                    .map_err(|e| execution_error(action, label, &format!("{e:#}")))
            })
            .await?;

        if !output.success() {
            let status = output.status.map_or_else(|| "signal".to_string(), |c| c.to_string());
            tracing::warn!(
                "`{}` exited with status {status}: {}",
                action.original(),
                output.stderr.trim_end()
            );
        }
        Ok(output.stdout.trim_end().to_string())
    }
}

fn plain(action: ImportAction, content: String) -> ResolvedImport {
    ResolvedImport {
        action,
        content,
        expand_from: None,
    }
}

fn io_error(action: &ImportAction, path: &Path, error: &anyhow::Error) -> ImportError {
    ImportError::Io {
        path: path.display().to_string(),
        reason: format!("{error:#}"),
        directive: action.original().to_string(),
        index: action.index(),
    }
}

fn execution_error(action: &ImportAction, command: &str, reason: &str) -> ImportError {
    ImportError::Execution {
        command: command.to_string(),
        reason: reason.to_string(),
        directive: action.original().to_string(),
        index: action.index(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::CommandOutput;
    use crate::markdown::parse_imports;
    use crate::test_utils::{MemoryEnvironment, MemoryResponse};
    use std::time::Duration;
    use tempfile::TempDir;

    fn docs() -> &'static Path {
        Path::new("/docs")
    }

    async fn resolve_text(
        env: &MemoryEnvironment,
        text: &str,
    ) -> Result<Vec<ResolvedImport>, ImportError> {
        let throttle = Throttle::new(4).unwrap();
        Resolver::new(env, &throttle)
            .resolve_all(parse_imports(text), docs(), &ExpansionStack::new())
            .await
    }

    #[tokio::test]
    async fn test_file_import_logs_and_reads() {
        let env = MemoryEnvironment::new().with_file("/docs/intro.md", "Hello");

        let resolved = resolve_text(&env, "See @./intro.md").await.unwrap();

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].content, "Hello");
        assert_eq!(resolved[0].expand_from, Some(PathBuf::from("/docs/intro.md")));
        assert_eq!(env.logs(), vec!["Reading /docs/./intro.md".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_and_binary_files() {
        let env = MemoryEnvironment::new().with_bytes("/docs/logo.png", vec![0x89, 0, 0]);

        let err = resolve_text(&env, "x @./missing.md").await.unwrap_err();
        assert!(matches!(
            err,
            ImportError::FileNotFound { ref directive, index: 2, .. } if directive == "@./missing.md"
        ));

        let err = resolve_text(&env, "@./logo.png").await.unwrap_err();
        assert!(matches!(err, ImportError::BinaryFile { .. }));
    }

    #[tokio::test]
    async fn test_line_range_is_not_recursed() {
        let env = MemoryEnvironment::new().with_file("/docs/code.rs", "a\nb\nc\nd");

        let resolved = resolve_text(&env, "@./code.rs:2-3").await.unwrap();

        assert_eq!(resolved[0].content, "b\nc");
        assert_eq!(resolved[0].expand_from, None);
    }

    #[tokio::test]
    async fn test_symbol_import() {
        let env = MemoryEnvironment::new()
            .with_file("/docs/types.ts", "export interface User {\n  id: string;\n}\n");

        let resolved = resolve_text(&env, "@./types.ts#User").await.unwrap();
        assert_eq!(resolved[0].content, "export interface User {\n  id: string;\n}");

        let err = resolve_text(&env, "@./types.ts#Account").await.unwrap_err();
        assert!(matches!(err, ImportError::SymbolNotFound { ref symbol, .. } if symbol == "Account"));
    }

    #[tokio::test]
    async fn test_glob_import_wraps_matches() {
        let env = MemoryEnvironment::new()
            .with_file("/docs/notes/b.md", "beta")
            .with_file("/docs/notes/a.md", "alpha")
            .with_file("/docs/notes/img.md", "\0binary");

        let resolved = resolve_text(&env, "@./notes/*.md").await.unwrap();

        assert_eq!(
            resolved[0].content,
            "<a-md path=\"./notes/a.md\">\nalpha\n</a-md>\n\n<b-md path=\"./notes/b.md\">\nbeta\n</b-md>"
        );
        assert!(env.logs().iter().any(|l| l.starts_with("Skipping binary file")));
    }

    #[tokio::test]
    async fn test_url_content_type_rejected() {
        let env = MemoryEnvironment::new().with_url(
            "https://example.com/page",
            "<html></html>",
            Some("text/html"),
        );

        let err = resolve_text(&env, "@https://example.com/page").await.unwrap_err();
        assert!(matches!(
            err,
            ImportError::UnsupportedContentType { ref content_type, .. } if content_type == "text/html"
        ));
    }

    #[tokio::test]
    async fn test_url_cache_hit_and_revalidation() {
        let temp = TempDir::new().unwrap();
        let url = "https://example.com/guide.md";
        let env = MemoryEnvironment::new().with_response(
            url,
            MemoryResponse {
                content: "# Guide".to_string(),
                content_type: Some("text/markdown".to_string()),
                etag: Some("\"v1\"".to_string()),
            },
        );
        let throttle = Throttle::new(2).unwrap();
        let text = format!("@{url}");

        // Fresh cache: first resolution fetches, second is served from disk.
        let cache = ContentCache::new(temp.path().to_path_buf(), Duration::from_secs(3600));
        let resolver = Resolver::new(&env, &throttle).with_cache(Some(&cache), false);
        for _ in 0..2 {
            let resolved =
                resolver.resolve_all(parse_imports(&text), docs(), &ExpansionStack::new()).await;
            assert_eq!(resolved.unwrap()[0].content, "# Guide");
        }
        assert_eq!(env.fetch_requests().len(), 1);

        // Zero TTL: every lookup is stale, so the stored ETag is sent and 304 reuses the body.
        let stale = ContentCache::new(temp.path().to_path_buf(), Duration::ZERO);
        let info = EntryInfo {
            etag: Some("\"v1\"".to_string()),
            ..EntryInfo::default()
        };
        stale.set(url, "# Guide", info, None).await.unwrap();
        let resolver = Resolver::new(&env, &throttle).with_cache(Some(&stale), false);
        let resolved =
            resolver.resolve_all(parse_imports(&text), docs(), &ExpansionStack::new()).await;

        assert_eq!(resolved.unwrap()[0].content, "# Guide");
        let requests = env.fetch_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].etag.as_deref(), Some("\"v1\""));
    }

    #[tokio::test]
    async fn test_bypass_cache_fetches_unconditionally() {
        let temp = TempDir::new().unwrap();
        let url = "https://example.com/data.json";
        let env = MemoryEnvironment::new().with_url(url, "{\"a\": 1}", None);
        let throttle = Throttle::new(2).unwrap();
        let cache = ContentCache::new(temp.path().to_path_buf(), Duration::from_secs(3600));
        cache.set(url, "{\"a\": 0}", EntryInfo::default(), None).await.unwrap();

        let resolver = Resolver::new(&env, &throttle).with_cache(Some(&cache), true);
        let resolved = resolver
            .resolve_all(parse_imports(&format!("@{url}")), docs(), &ExpansionStack::new())
            .await
            .unwrap();

        assert_eq!(resolved[0].content, "{\"a\": 1}");
        assert_eq!(cache.get(url).await.content.as_deref(), Some("{\"a\": 1}"));
    }

    #[tokio::test]
    async fn test_command_nonzero_exit_returns_stdout() {
        let env = MemoryEnvironment::new().with_command(
            "git status",
            CommandOutput {
                stdout: "fatal-ish output\n\n".to_string(),
                stderr: "not a repository".to_string(),
                status: Some(128),
            },
        );

        let resolved = resolve_text(&env, "Status: !`git status`").await.unwrap();

        assert_eq!(resolved[0].content, "fatal-ish output");
        assert_eq!(env.logs(), vec!["Running command git status".to_string()]);
    }

    #[tokio::test]
    async fn test_executable_fence_uses_shebang_interpreter() {
        let code = "#!/usr/bin/env python3\nprint('hi')";
        let env = MemoryEnvironment::new().with_command_stdout(code, "hi\n");

        let text = format!("```python\n{code}\n```\n");
        let resolved = resolve_text(&env, &text).await.unwrap();

        assert_eq!(resolved[0].content, "hi");
        assert_eq!(
            env.exec_requests(),
            vec![ExecRequest::Script {
                interpreter: "/usr/bin/env python3".to_string(),
                code: code.to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_cycle_rejected_with_chain() {
        let env = MemoryEnvironment::new().with_file("/docs/A.md", "@./A.md");
        let throttle = Throttle::new(1).unwrap();
        let stack = ExpansionStack::root("/docs/A.md");

        let err = Resolver::new(&env, &throttle)
            .resolve_all(parse_imports("@./A.md"), docs(), &stack)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("/docs/A.md -> /docs/A.md"));
    }

    #[tokio::test]
    async fn test_order_preserved_under_throttle() {
        let mut env = MemoryEnvironment::new().with_latency(Duration::from_millis(5));
        let mut text = String::new();
        for i in 0..6 {
            env = env.with_file(format!("/docs/{i}.md"), &format!("file {i}"));
            text.push_str(&format!("@./{i}.md\n"));
        }
        let throttle = Throttle::new(2).unwrap();

        let resolved = Resolver::new(&env, &throttle)
            .resolve_all(parse_imports(&text), docs(), &ExpansionStack::new())
            .await
            .unwrap();

        let contents: Vec<_> = resolved.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, ["file 0", "file 1", "file 2", "file 3", "file 4", "file 5"]);
        assert!(env.peak_concurrency() <= 2);
        assert_eq!(throttle.available(), 2);
    }

    #[tokio::test]
    async fn test_home_relative_path() {
        let env = MemoryEnvironment::new()
            .with_home("/home/me")
            .with_file("/home/me/notes.md", "mine");

        let resolved = resolve_text(&env, "@~/notes.md").await.unwrap();
        assert_eq!(resolved[0].content, "mine");
    }
}
