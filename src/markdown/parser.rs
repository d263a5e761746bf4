//! Import directive parsing for markdown documents.
//!
//! A single scan of the document produces an ordered list of
//! [`ImportAction`]s. Three kinds of syntax are matched:
//!
//! - **Executable fences**: a closed, top-level fenced block whose first body
//!   line is a `#!` shebang. Fences come from the
//!   [`scanner`](super::scanner), so a fence quoted inside another block,
//!   a blockquote or a list item is never executed. Up to three spaces of
//!   opening indentation are removed from each body line.
//! - **Inline commands**: `` !`cmd` `` with any number of matching backticks,
//!   so commands containing literal backticks can be written as
//!   ``` !``echo `date` `` ```.
//! - **`@` targets**: classified as URL, glob, symbol, line-range file or
//!   plain file.
//!
//! Inline commands and `@` targets are accepted only when their first
//! character lies in a safe range.
//!
//! # Examples
//!
//! ```rust
//! use mdimport::markdown::parser::parse_imports;
//!
//! let actions = parse_imports("See @./notes.md and `@./ignored.md`.");
//! assert_eq!(actions.len(), 1);
//! assert_eq!(actions[0].original(), "@./notes.md");
//! ```

use super::scanner::{SafeRanges, scan_safe_ranges};
use crate::imports::{ImportAction, LineRange};
use regex::Regex;
use std::sync::LazyLock;

static TARGET_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(?:^|[^\w@/])@(https?://[^\s<>"'`\)\]]+|(?:~|\.{1,2})?/[^\s<>"'`\)]+)"#).ok()
});

static SYMBOL_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(.+)#([A-Za-z_$][\w$]*)$").ok());

static LINE_RANGE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(.+):(\d+)-(\d+)$").ok());

/// Parse every import directive in `text`, sorted by offset.
///
/// Actions never overlap. Text without any directive yields an empty list.
#[must_use]
pub fn parse_imports(text: &str) -> Vec<ImportAction> {
    let safe = scan_safe_ranges(text);

    let mut actions = executable_fences(text, &safe);
    actions.extend(inline_commands(text, &safe));
    actions.extend(targets(text, &safe));
    actions.sort_by_key(ImportAction::index);

    let mut cursor = 0;
    actions.retain(|action| {
        if action.index() < cursor {
            return false;
        }
        cursor = action.end();
        true
    });

    tracing::trace!("Parsed {} import action(s)", actions.len());
    actions
}

fn executable_fences(text: &str, safe: &SafeRanges) -> Vec<ImportAction> {
    let mut actions = Vec::new();

    for fence in safe.fences() {
        if !fence.closed {
            continue;
        }
        let lines: Vec<&str> = text[fence.body.clone()]
            .lines()
            .map(|line| strip_indent(line, fence.indent))
            .collect();
        let Some(shebang) = lines.first().copied().filter(|l| l.starts_with("#!")) else {
            continue;
        };
        if !fence.top_level {
            tracing::debug!("Ignoring nested executable fence at offset {}", fence.start);
            continue;
        }

        let language = text[fence.info.clone()]
            .split_whitespace()
            .next()
            .map_or_else(|| interpreter_name(shebang), str::to_string);
        actions.push(ImportAction::ExecutableCodeFence {
            language,
            shebang: shebang.trim_end().to_string(),
            code: lines.join("\n"),
            original: text[fence.start..fence.end].to_string(),
            index: fence.start,
        });
    }

    actions
}

/// Remove up to `indent` leading spaces, matching the opening fence.
fn strip_indent(line: &str, indent: usize) -> &str {
    let spaces = line.bytes().take(indent).take_while(|&b| b == b' ').count();
    &line[spaces..]
}

/// Interpreter name from a shebang: `#!/usr/bin/env python3` gives `python3`.
fn interpreter_name(shebang: &str) -> String {
    let mut parts = shebang.trim_start_matches("#!").split_whitespace();
    let program = parts.next().unwrap_or_default();
    let name = program.rsplit('/').next().unwrap_or(program);
    if name == "env" {
        parts.find(|p| !p.starts_with('-')).unwrap_or(name).to_string()
    } else {
        name.to_string()
    }
}

fn inline_commands(text: &str, safe: &SafeRanges) -> Vec<ImportAction> {
    let bytes = text.as_bytes();
    let mut actions = Vec::new();
    let mut i = 0;

    while i + 1 < bytes.len() {
        if bytes[i] != b'!' || bytes[i + 1] != b'`' {
            i += 1;
            continue;
        }

        let open_start = i + 1;
        let mut j = open_start;
        while j < bytes.len() && bytes[j] == b'`' {
            j += 1;
        }
        let ticks = j - open_start;

        let Some((close_start, close_end)) = find_closing_ticks(bytes, j, ticks) else {
            i = j;
            continue;
        };

        let inner = &text[j..close_start];
        let command = inner.trim();
        if !command.is_empty() && safe.contains(i) {
            actions.push(ImportAction::Command {
                command: command.to_string(),
                original: text[i..close_end].to_string(),
                index: i,
            });
        }
        i = close_end;
    }

    actions
}

/// Find a run of exactly `ticks` backticks on the same line, starting at `from`.
fn find_closing_ticks(bytes: &[u8], from: usize, ticks: usize) -> Option<(usize, usize)> {
    let mut k = from;
    while k < bytes.len() && bytes[k] != b'\n' {
        if bytes[k] != b'`' {
            k += 1;
            continue;
        }
        let run_start = k;
        while k < bytes.len() && bytes[k] == b'`' {
            k += 1;
        }
        if k - run_start == ticks {
            return Some((run_start, k));
        }
    }
    None
}

fn targets(text: &str, safe: &SafeRanges) -> Vec<ImportAction> {
    let mut actions = Vec::new();
    let Some(target_re) = TARGET_RE.as_ref() else {
        return actions;
    };

    for caps in target_re.captures_iter(text) {
        let Some(target) = caps.get(1) else {
            continue;
        };
        let index = target.start() - 1;
        if !safe.contains(index) {
            continue;
        }

        let raw = trim_trailing_punctuation(target.as_str());
        if raw.is_empty() || raw == "/" {
            continue;
        }
        let original = format!("@{raw}");
        actions.push(classify_target(raw, original, index));
    }

    actions
}

fn trim_trailing_punctuation(target: &str) -> &str {
    let mut trimmed = target.trim_end_matches(['.', ',', ';', ':', '!', '?']);
    while trimmed.ends_with(']') && trimmed.matches('[').count() < trimmed.matches(']').count() {
        trimmed = &trimmed[..trimmed.len() - 1];
        trimmed = trimmed.trim_end_matches(['.', ',', ';', ':', '!', '?']);
    }
    trimmed
}

fn classify_target(target: &str, original: String, index: usize) -> ImportAction {
    if target.starts_with("http://") || target.starts_with("https://") {
        return ImportAction::Url {
            url: target.to_string(),
            original,
            index,
        };
    }

    if target.contains(['*', '?', '[']) {
        return ImportAction::Glob {
            pattern: target.to_string(),
            original,
            index,
        };
    }

    if let Some(caps) = SYMBOL_RE.as_ref().and_then(|re| re.captures(target)) {
        return ImportAction::Symbol {
            path: caps[1].to_string(),
            symbol: caps[2].to_string(),
            original,
            index,
        };
    }

    if let Some(caps) = LINE_RANGE_RE.as_ref().and_then(|re| re.captures(target)) {
        if let (Ok(start), Ok(end)) = (caps[2].parse::<usize>(), caps[3].parse::<usize>()) {
            return ImportAction::File {
                path: caps[1].to_string(),
                line_range: Some(LineRange { start, end }),
                original,
                index,
            };
        }
    }

    ImportAction::File {
        path: target.to_string(),
        line_range: None,
        original,
        index,
    }
}
