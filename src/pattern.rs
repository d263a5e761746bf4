//! Filesystem glob matching for glob imports.
//!
//! # Pattern Syntax
//!
//! - `*` matches any sequence of characters within a single path component
//! - `**` matches any sequence of path components (recursive matching)
//! - `?` matches any single character
//! - `[abc]` / `[a-z]` match one character from a set or range
//!
//! A pattern is split into a literal directory prefix and a glob part. The
//! prefix is resolved like any other import path; the glob part is matched
//! against paths relative to it, using `/` separators on every platform.
//!
//! ```rust
//! use mdimport::pattern::split_literal_prefix;
//!
//! assert_eq!(split_literal_prefix("./docs/**/*.md"), ("./docs", "**/*.md"));
//! assert_eq!(split_literal_prefix("*.md"), ("", "*.md"));
//! ```

use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Split `pattern` at the last `/` before its first glob metacharacter.
///
/// Returns `(prefix, glob)`. The prefix is empty when the first component
/// already contains a metacharacter, and `/` for root-level globs.
#[must_use]
pub fn split_literal_prefix(pattern: &str) -> (&str, &str) {
    let first_meta = pattern.find(['*', '?', '[']).unwrap_or(pattern.len());
    match pattern[..first_meta].rfind('/') {
        Some(0) => ("/", &pattern[1..]),
        Some(slash) => (&pattern[..slash], &pattern[slash + 1..]),
        None => ("", pattern),
    }
}

/// A compiled glob matched against relative paths.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    pattern: Pattern,
    original_pattern: String,
}

impl PatternMatcher {
    /// Compile a glob pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern has invalid glob syntax.
    pub fn new(pattern_str: &str) -> Result<Self> {
        let pattern = Pattern::new(pattern_str)
            .with_context(|| format!("Invalid glob pattern: {pattern_str}"))?;

        Ok(Self {
            pattern,
            original_pattern: pattern_str.to_string(),
        })
    }

    /// All files under `base_path` whose relative path matches, sorted.
    ///
    /// Symlinks are not followed. A missing `base_path` yields no matches.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory under `base_path` cannot be read.
    pub fn find_matches(&self, base_path: &Path) -> Result<Vec<PathBuf>> {
        debug!("Searching for pattern '{}' in {}", self.original_pattern, base_path.display());

        if !base_path.is_dir() {
            return Ok(Vec::new());
        }

        let mut matches = Vec::new();
        for entry in WalkDir::new(base_path).follow_links(false).sort_by_file_name() {
            let entry = entry.with_context(|| {
                format!("Failed to walk {} for '{}'", base_path.display(), self.original_pattern)
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            if let Ok(relative_path) = entry.path().strip_prefix(base_path) {
                trace!("Checking path: {}", relative_path.display());
                if self.matches(relative_path) {
                    matches.push(relative_path.to_path_buf());
                }
            }
        }

        matches.sort();
        debug!("Found {} matches for pattern '{}'", matches.len(), self.original_pattern);
        Ok(matches)
    }

    /// Whether a relative path matches.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        let normalized = path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        self.pattern.matches_with(&normalized, MATCH_OPTIONS)
    }

    /// The pattern as written.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.original_pattern
    }
}

/// Join a literal prefix and a relative match into a display path.
#[must_use]
pub fn display_path(prefix: &str, relative: &Path) -> String {
    let relative = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    match prefix.trim_end_matches('/') {
        "" if prefix.is_empty() => relative,
        trimmed => format!("{trimmed}/{relative}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_split_literal_prefix() {
        assert_eq!(split_literal_prefix("./src/*.ts"), ("./src", "*.ts"));
        assert_eq!(split_literal_prefix("/abs/dir/**/x?.md"), ("/abs/dir", "**/x?.md"));
        assert_eq!(split_literal_prefix("/*.md"), ("/", "*.md"));
        assert_eq!(split_literal_prefix("~/notes/[ab].md"), ("~/notes", "[ab].md"));
    }

    #[test]
    fn test_single_star_does_not_cross_directories() {
        let matcher = PatternMatcher::new("*.md").unwrap();
        assert!(matcher.matches(Path::new("a.md")));
        assert!(!matcher.matches(Path::new("nested/a.md")));

        let recursive = PatternMatcher::new("**/*.md").unwrap();
        assert!(recursive.matches(Path::new("a.md")));
        assert!(recursive.matches(Path::new("nested/deep/a.md")));
    }

    #[test]
    fn test_find_matches_sorted_files_only() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        std::fs::create_dir_all(root.join("b/inner.md")).unwrap();
        std::fs::write(root.join("z.md"), "z").unwrap();
        std::fs::write(root.join("a.md"), "a").unwrap();
        std::fs::write(root.join("b/c.md"), "c").unwrap();
        std::fs::write(root.join("notes.txt"), "n").unwrap();

        let matcher = PatternMatcher::new("**/*.md").unwrap();
        let matches = matcher.find_matches(root).unwrap();

        assert_eq!(
            matches,
            vec![PathBuf::from("a.md"), PathBuf::from("b/c.md"), PathBuf::from("z.md")]
        );
    }

    #[test]
    fn test_find_matches_missing_base() {
        let temp = TempDir::new().unwrap();
        let matcher = PatternMatcher::new("*.md").unwrap();
        assert!(matcher.find_matches(&temp.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn test_display_path() {
        assert_eq!(display_path("./docs", Path::new("a/b.md")), "./docs/a/b.md");
        assert_eq!(display_path("/", Path::new("b.md")), "/b.md");
        assert_eq!(display_path("", Path::new("b.md")), "b.md");
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(PatternMatcher::new("[unclosed").is_err());
    }
}
