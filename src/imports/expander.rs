//! Parse, resolve and splice, recursively.
//!
//! [`Expander`] owns the environment, the throttle and the optional content
//! cache for one configuration, and drives the pipeline:
//!
//! 1. parse the text into actions,
//! 2. resolve all actions concurrently,
//! 3. expand whole-file imports recursively, each relative to its own
//!    directory and under an [`ExpansionStack`] extended with its path,
//! 4. splice every result over its directive.
//!
//! Only whole-file imports recurse. Line ranges, symbols, globs, URLs and
//! command output are spliced verbatim, so fetched or generated text never
//! triggers further imports or commands.
//!
//! The first failure anywhere aborts the whole expansion; sibling work still
//! in flight is dropped.

use super::resolver::Resolver;
use super::{ExpansionStack, ResolvedImport};
use crate::cache::ContentCache;
use crate::constants::default_parallelism;
use crate::core::ImportError;
use crate::env::ExecutionEnvironment;
use crate::markdown::parse_imports;
use crate::tokens::TokenBudget;
use crate::utils::throttle::Throttle;
use futures::future::try_join_all;
use std::path::Path;

/// Knobs for an [`Expander`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandOptions {
    /// Throttle permits shared by all resolutions
    pub max_parallel: usize,
    /// Skip cache lookups (fresh bodies are still stored)
    pub bypass_cache: bool,
    /// Budget applied to the fully expanded text, if any
    pub budget: Option<TokenBudget>,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self {
            max_parallel: default_parallelism(),
            bypass_cache: false,
            budget: Some(TokenBudget::default()),
        }
    }
}

/// Drives import expansion for documents.
pub struct Expander<E> {
    env: E,
    cache: Option<ContentCache>,
    throttle: Throttle,
    options: ExpandOptions,
}

impl<E: ExecutionEnvironment> Expander<E> {
    /// Create an expander without a content cache.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::InvalidThrottle`] if `max_parallel` is zero.
    pub fn new(env: E, options: ExpandOptions) -> Result<Self, ImportError> {
        let throttle = Throttle::new(options.max_parallel)?;
        Ok(Self {
            env,
            cache: None,
            throttle,
            options,
        })
    }

    /// Cache URL imports in `cache`.
    #[must_use]
    pub fn with_cache(mut self, cache: ContentCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The environment all I/O goes through.
    pub const fn env(&self) -> &E {
        &self.env
    }

    /// The options this expander was built with.
    pub const fn options(&self) -> &ExpandOptions {
        &self.options
    }

    fn resolver(&self) -> Resolver<'_, E> {
        Resolver::new(&self.env, &self.throttle)
            .with_cache(self.cache.as_ref(), self.options.bypass_cache)
    }

    /// One parse and resolve pass over `text`, without recursion or splicing.
    ///
    /// The result is aligned with the parsed actions: splicing each
    /// `content` over its `action.original()` at `action.index()` yields the
    /// expanded text.
    pub async fn resolve_document(
        &self,
        text: &str,
        cwd: &Path,
    ) -> Result<Vec<ResolvedImport>, ImportError> {
        self.resolver().resolve_all(parse_imports(text), cwd, &ExpansionStack::new()).await
    }

    /// Fully expand `text`, resolving relative imports against `cwd`.
    pub async fn expand(&self, text: &str, cwd: &Path) -> Result<String, ImportError> {
        let expanded = self.expand_inner(text, cwd, ExpansionStack::new()).await?;
        self.check_budget(&expanded)?;
        Ok(expanded)
    }

    /// Fully expand the file at `path`.
    ///
    /// The file itself seeds the cycle guard, so an import of the root
    /// document from anywhere below it is rejected.
    pub async fn expand_file(&self, path: &Path) -> Result<String, ImportError> {
        let root_error = |e: anyhow::Error| ImportError::Io {
            path: path.display().to_string(),
            reason: format!("{e:#}"),
            directive: path.display().to_string(),
            index: 0,
        };
        if !self.env.file_exists(path).await {
            return Err(ImportError::FileNotFound {
                path: path.display().to_string(),
                directive: path.display().to_string(),
                index: 0,
            });
        }
        let canonical = self.env.canonicalize(path).await.map_err(root_error)?;
        let text = self.env.read_text(&canonical).await.map_err(root_error)?;
        let cwd = canonical.parent().unwrap_or_else(|| Path::new("/"));

        tracing::debug!("Expanding {}", canonical.display());
        let expanded = self.expand_inner(&text, cwd, ExpansionStack::root(&canonical)).await?;
        self.check_budget(&expanded)?;
        Ok(expanded)
    }

    async fn expand_inner(
        &self,
        text: &str,
        cwd: &Path,
        stack: ExpansionStack,
    ) -> Result<String, ImportError> {
        let actions = parse_imports(text);
        if actions.is_empty() {
            return Ok(text.to_string());
        }

        let resolved = self.resolver().resolve_all(actions, cwd, &stack).await?;
        let stack = &stack;
        let expanded = try_join_all(resolved.into_iter().map(|import| async move {
            let Some(path) = import.expand_from.clone() else {
                return Ok::<_, ImportError>(import);
            };
            let child_stack = stack.descend(&path).map_err(|chain| ImportError::CircularImport {
                chain,
                directive: import.action.original().to_string(),
                index: import.action.index(),
            })?;
            let child_cwd = path.parent().unwrap_or(cwd);
            let content = Box::pin(self.expand_inner(&import.content, child_cwd, child_stack)).await?;
            Ok(ResolvedImport {
                content,
                ..import
            })
        }))
        .await?;

        Ok(splice(text, &expanded))
    }

    fn check_budget(&self, expanded: &str) -> Result<(), ImportError> {
        if let Some(budget) = &self.options.budget {
            budget.check(expanded)?;
        }
        Ok(())
    }
}

/// Replace each resolved directive in `text` with its content.
///
/// `resolved` must be sorted by index and non-overlapping, as produced by
/// the parser.
///
/// ```rust
/// use mdimport::imports::{ImportAction, ResolvedImport, splice};
///
/// let action = ImportAction::Command {
///     command: "date".to_string(),
///     original: "!`date`".to_string(),
///     index: 6,
/// };
/// let resolved = vec![ResolvedImport { action, content: "Monday".to_string(), expand_from: None }];
/// assert_eq!(splice("Today !`date`.", &resolved), "Today Monday.");
/// ```
#[must_use]
pub fn splice(text: &str, resolved: &[ResolvedImport]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for import in resolved {
        let start = import.action.index();
        if start < cursor || start > text.len() {
            continue;
        }
        out.push_str(&text[cursor..start]);
        out.push_str(&import.content);
        cursor = import.action.end().min(text.len());
    }
    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MemoryEnvironment;
    use std::path::PathBuf;

    fn expander(env: MemoryEnvironment) -> Expander<MemoryEnvironment> {
        Expander::new(
            env,
            ExpandOptions {
                max_parallel: 4,
                ..ExpandOptions::default()
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_plain_text_is_unchanged() {
        let expander = expander(MemoryEnvironment::new());
        let text = "No imports here.\n";
        assert_eq!(expander.expand(text, Path::new("/docs")).await.unwrap(), text);
        assert!(expander.env().logs().is_empty());
    }

    #[tokio::test]
    async fn test_nested_imports_resolve_relative_to_importing_file() {
        let env = MemoryEnvironment::new()
            .with_file("/docs/index.md", "Top\n@./guide/intro.md\nEnd")
            .with_file("/docs/guide/intro.md", "Intro [@./parts/one.md]")
            .with_file("/docs/guide/parts/one.md", "ONE");
        let expander = expander(env);

        let out = expander.expand_file(Path::new("/docs/index.md")).await.unwrap();
        assert_eq!(out, "Top\nIntro [ONE]\nEnd");
    }

    #[tokio::test]
    async fn test_cycle_reports_full_chain() {
        let env = MemoryEnvironment::new()
            .with_file("/docs/A.md", "A imports @./B.md")
            .with_file("/docs/B.md", "B imports @./A.md");
        let expander = expander(env);

        let err = expander.expand_file(Path::new("/docs/A.md")).await.unwrap_err();
        assert!(matches!(err, ImportError::CircularImport { .. }));
        assert!(err.to_string().contains("/docs/A.md -> /docs/B.md -> /docs/A.md"));
    }

    #[tokio::test]
    async fn test_diamond_imports_are_allowed() {
        let env = MemoryEnvironment::new()
            .with_file("/d/A.md", "@./B.md + @./C.md")
            .with_file("/d/B.md", "b(@./D.md)")
            .with_file("/d/C.md", "c(@./D.md)")
            .with_file("/d/D.md", "d");
        let expander = expander(env);

        let out = expander.expand_file(Path::new("/d/A.md")).await.unwrap();
        assert_eq!(out, "b(d) + c(d)");
    }

    #[tokio::test]
    async fn test_generated_content_is_not_reexpanded() {
        let env = MemoryEnvironment::new()
            .with_command_stdout("cat notes", "@./secret.md !`rm -rf x`")
            .with_file("/docs/code.md", "line1\n@./other.md\nline3");
        let expander = expander(env);

        let out = expander
            .expand("!`cat notes` | @./code.md:2-2", Path::new("/docs"))
            .await
            .unwrap();

        assert_eq!(out, "@./secret.md !`rm -rf x` | @./other.md");
        assert_eq!(expander.env().exec_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_first_failure_aborts() {
        let env = MemoryEnvironment::new().with_file("/docs/ok.md", "fine");
        let expander = expander(env);

        let err = expander.expand("@./ok.md @./missing.md", Path::new("/docs")).await.unwrap_err();
        assert!(matches!(err, ImportError::FileNotFound { index: 9, .. }));
    }

    #[tokio::test]
    async fn test_budget_exceeded() {
        let env = MemoryEnvironment::new().with_file("/docs/big.md", &"word ".repeat(400));
        let expander = Expander::new(
            env,
            ExpandOptions {
                max_parallel: 2,
                bypass_cache: false,
                budget: Some(TokenBudget::new(10, 50)),
            },
        )
        .unwrap();

        let err = expander.expand("@./big.md", Path::new("/docs")).await.unwrap_err();
        assert!(matches!(err, ImportError::BudgetExceeded { max: 50, .. }));
    }

    #[tokio::test]
    async fn test_resolve_document_is_one_pass() {
        let env = MemoryEnvironment::new()
            .with_file("/docs/a.md", "@./b.md")
            .with_file("/docs/b.md", "B");
        let expander = expander(env);

        let resolved = expander.resolve_document("x @./a.md", Path::new("/docs")).await.unwrap();

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].content, "@./b.md");
        assert_eq!(resolved[0].expand_from, Some(PathBuf::from("/docs/a.md")));
        assert_eq!(splice("x @./a.md", &resolved), "x @./b.md");
    }

    #[test]
    fn test_zero_parallelism_rejected() {
        let result = Expander::new(
            MemoryEnvironment::new(),
            ExpandOptions {
                max_parallel: 0,
                ..ExpandOptions::default()
            },
        );
        assert!(matches!(result, Err(ImportError::InvalidThrottle { permits: 0 })));
    }
}
