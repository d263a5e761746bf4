//! Import directives and their resolution.
//!
//! A document declares external content with inline directives:
//!
//! | Form | Meaning |
//! |---|---|
//! | `@./rel/path.ext`, `@~/path`, `@/abs/path` | file import |
//! | `@./dir/**/*.ext` | glob import |
//! | `@./file.ts#SymbolName` | symbol import |
//! | `@./file.ts:10-50` | line-range import (1-indexed, inclusive) |
//! | `@https://host/path` | URL import |
//! | `` !`cmd` `` | inline command import |
//! | fenced block whose first line is `#!...` | executable code fence |
//!
//! The [`crate::markdown::parser`] turns a document into an ordered list of
//! [`ImportAction`]s, the [`resolver`] fetches or computes each one, and the
//! [`expander`] splices results back into the text, recursing into imported
//! files under the protection of the [`stack`] cycle guard.

pub mod expander;
pub mod glob_wrap;
pub mod resolver;
pub mod stack;
pub mod symbol;
pub mod url;

pub use expander::{ExpandOptions, Expander, splice};
pub use resolver::Resolver;
pub use stack::ExpansionStack;

use serde::Serialize;
use std::path::PathBuf;

/// A 1-indexed, inclusive line range attached to a file import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineRange {
    /// First line to include (1-indexed)
    pub start: usize,
    /// Last line to include (inclusive)
    pub end: usize,
}

impl LineRange {
    /// Slice `content` to this range, clamped to the available lines.
    ///
    /// ```rust
    /// use mdimport::imports::LineRange;
    ///
    /// let range = LineRange { start: 2, end: 3 };
    /// assert_eq!(range.slice("a\nb\nc\nd"), "b\nc");
    /// ```
    #[must_use]
    pub fn slice(&self, content: &str) -> String {
        let lines: Vec<&str> = content.split('\n').collect();
        let start = self.start.saturating_sub(1).min(lines.len());
        let end = self.end.min(lines.len()).max(start);
        lines[start..end].join("\n")
    }
}

/// A parsed import directive.
///
/// Every variant carries `original` (the exact matched source text, used for
/// splicing) and `index` (its byte offset, used for ordering).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ImportAction {
    /// `@path` or `@path:start-end`
    File {
        /// Path as written, without the `@`
        path: String,
        /// Optional line range
        line_range: Option<LineRange>,
        /// Matched source text
        original: String,
        /// Byte offset in the document
        index: usize,
    },
    /// `@pattern` containing `*`, `?` or `[`
    Glob {
        /// Glob pattern as written
        pattern: String,
        /// Matched source text
        original: String,
        /// Byte offset in the document
        index: usize,
    },
    /// `@path#Symbol`
    Symbol {
        /// Path as written
        path: String,
        /// Declaration name to extract
        symbol: String,
        /// Matched source text
        original: String,
        /// Byte offset in the document
        index: usize,
    },
    /// `@http(s)://...`
    Url {
        /// The URL
        url: String,
        /// Matched source text
        original: String,
        /// Byte offset in the document
        index: usize,
    },
    /// `` !`cmd` ``
    Command {
        /// Command line to run in a shell
        command: String,
        /// Matched source text
        original: String,
        /// Byte offset in the document
        index: usize,
    },
    /// A top-level fenced block whose first line is a shebang.
    ExecutableCodeFence {
        /// Info string of the fence (or the interpreter name when empty)
        language: String,
        /// The `#!` line
        shebang: String,
        /// Block body, shebang included
        code: String,
        /// Matched source text (fences included)
        original: String,
        /// Byte offset in the document
        index: usize,
    },
}

impl ImportAction {
    /// The exact source text this action was parsed from.
    #[must_use]
    pub fn original(&self) -> &str {
        match self {
            Self::File { original, .. }
            | Self::Glob { original, .. }
            | Self::Symbol { original, .. }
            | Self::Url { original, .. }
            | Self::Command { original, .. }
            | Self::ExecutableCodeFence { original, .. } => original,
        }
    }

    /// Byte offset of the directive in its document.
    #[must_use]
    pub const fn index(&self) -> usize {
        match self {
            Self::File { index, .. }
            | Self::Glob { index, .. }
            | Self::Symbol { index, .. }
            | Self::Url { index, .. }
            | Self::Command { index, .. }
            | Self::ExecutableCodeFence { index, .. } => *index,
        }
    }

    /// Byte offset one past the end of the directive.
    #[must_use]
    pub fn end(&self) -> usize {
        self.index() + self.original().len()
    }

    /// Stable lowercase name of the action kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::File { .. } => "file",
            Self::Glob { .. } => "glob",
            Self::Symbol { .. } => "symbol",
            Self::Url { .. } => "url",
            Self::Command { .. } => "command",
            Self::ExecutableCodeFence { .. } => "executableCodeFence",
        }
    }
}

/// An action paired with its fetched or computed content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImport {
    /// The action that produced this content
    pub action: ImportAction,
    /// Text to splice in place of `action.original()`
    pub content: String,
    /// Canonical path of a whole-file import; such content is expanded recursively.
    pub expand_from: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_range_slice() {
        let range = LineRange { start: 2, end: 3 };
        assert_eq!(range.slice("a\nb\nc\nd"), "b\nc");
    }

    #[test]
    fn test_line_range_clamps() {
        assert_eq!(LineRange { start: 3, end: 99 }.slice("a\nb\nc\nd"), "c\nd");
        assert_eq!(LineRange { start: 10, end: 12 }.slice("a\nb"), "");
        assert_eq!(LineRange { start: 0, end: 1 }.slice("a\nb"), "a");
        assert_eq!(LineRange { start: 3, end: 2 }.slice("a\nb\nc"), "");
    }

    #[test]
    fn test_action_accessors() {
        let action = ImportAction::Url {
            url: "https://example.com/a.md".to_string(),
            original: "@https://example.com/a.md".to_string(),
            index: 4,
        };
        assert_eq!(action.index(), 4);
        assert_eq!(action.end(), 4 + "@https://example.com/a.md".len());
        assert_eq!(action.kind(), "url");
    }

    #[test]
    fn test_action_serializes_tagged() {
        let action = ImportAction::File {
            path: "./a.md".to_string(),
            line_range: Some(LineRange { start: 1, end: 2 }),
            original: "@./a.md:1-2".to_string(),
            index: 0,
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "file");
        assert_eq!(json["lineRange"]["start"], 1);
    }
}
