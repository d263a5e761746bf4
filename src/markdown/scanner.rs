//! Safe-range scanning for markdown documents.
//!
//! Import directives are only recognized outside code: a path written inside
//! a fenced block, an indented block or an inline code span is documentation,
//! not an instruction. This module computes the complement of all code
//! regions, the *safe ranges*, as half-open byte ranges.
//!
//! # Structure Recognized
//!
//! - Fenced blocks (```` ``` ```` or `~~~`, three or more markers), including
//!   fences nested in blockquotes and list items
//! - Indented blocks (4 spaces or a tab after a blank line, outside lists)
//! - Inline code spans with variable-length backtick delimiters
//!
//! The start offset of every code region is also recorded, together with the
//! full extent of every fenced block. The parser builds executable fences
//! from those blocks, so a fence is paired exactly once, here.
//!
//! # Fast Path
//!
//! Text without backticks, tildes, indented lines or container markers
//! cannot contain code, so it is returned as a single safe range without any
//! structural parsing.

use std::collections::BTreeSet;
use std::ops::Range;

/// Byte ranges of a document in which import syntax may be recognized.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SafeRanges {
    ranges: Vec<Range<usize>>,
    block_starts: BTreeSet<usize>,
    fences: Vec<FencedBlock>,
}

/// A fenced code block as paired by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedBlock {
    /// Offset of the first fence marker
    pub start: usize,
    /// End of the closing fence line, or of the document if unclosed
    pub end: usize,
    /// Info string after the opening markers
    pub info: Range<usize>,
    /// Lines between the fences, without the final line break
    pub body: Range<usize>,
    /// Spaces before the opening marker
    pub indent: usize,
    /// Not inside a blockquote or list item
    pub top_level: bool,
    /// Whether a closing fence was found
    pub closed: bool,
}

impl SafeRanges {
    /// The safe ranges, sorted and non-overlapping.
    #[must_use]
    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    /// Whether `offset` lies inside a safe range.
    #[must_use]
    pub fn contains(&self, offset: usize) -> bool {
        let idx = self.ranges.partition_point(|r| r.start <= offset);
        idx > 0 && self.ranges[idx - 1].contains(&offset)
    }

    /// Whether a code region starts exactly at `offset`.
    #[must_use]
    pub fn is_block_start(&self, offset: usize) -> bool {
        self.block_starts.contains(&offset)
    }

    /// Every fenced block, in document order.
    #[must_use]
    pub fn fences(&self) -> &[FencedBlock] {
        &self.fences
    }
}

/// Compute the safe ranges of `text`.
///
/// # Examples
///
/// ```rust
/// use mdimport::markdown::scanner::scan_safe_ranges;
///
/// let text = "see `@./secret.md` and @./public.md";
/// let safe = scan_safe_ranges(text);
/// assert!(!safe.contains(text.find("@./secret").unwrap()));
/// assert!(safe.contains(text.find("@./public").unwrap()));
/// ```
#[must_use]
pub fn scan_safe_ranges(text: &str) -> SafeRanges {
    if is_plain_text(text) {
        return SafeRanges {
            ranges: vec![0..text.len()],
            block_starts: BTreeSet::new(),
            fences: Vec::new(),
        };
    }

    let (regions, fences) = code_regions(text);
    let block_starts = regions.iter().map(|r| r.start).collect();
    SafeRanges {
        ranges: invert(&regions, text.len()),
        block_starts,
        fences,
    }
}

fn is_plain_text(text: &str) -> bool {
    !text.contains(['`', '~'])
        && !text.lines().any(|line| is_indented(line) || container_prefix(line).0 > 0)
}

fn is_indented(line: &str) -> bool {
    line.starts_with("    ") || line.starts_with('\t')
}

struct OpenFence {
    marker: u8,
    len: usize,
    start: usize,
    info: Range<usize>,
    body_start: usize,
    body_end: Option<usize>,
    indent: usize,
    top_level: bool,
}

impl OpenFence {
    fn finish(self, end: usize, closed: bool) -> FencedBlock {
        FencedBlock {
            start: self.start,
            end,
            info: self.info,
            body: self.body_start..self.body_end.unwrap_or(self.body_start),
            indent: self.indent,
            top_level: self.top_level,
            closed,
        }
    }
}

fn code_regions(text: &str) -> (Vec<Range<usize>>, Vec<FencedBlock>) {
    let mut regions = Vec::new();
    let mut fences = Vec::new();
    let mut paragraphs = Vec::new();
    let mut fence: Option<OpenFence> = None;
    let mut indented: Option<Range<usize>> = None;
    let mut paragraph: Option<Range<usize>> = None;
    let mut prev_blank = true;
    let mut in_list = false;
    let mut offset = 0;

    for raw in text.split_inclusive('\n') {
        let start = offset;
        offset += raw.len();
        let line = raw.trim_end_matches(['\n', '\r']);
        let end = start + line.len();

        if let Some(open) = &mut fence {
            if is_closing_fence(line, open) {
                regions.push(open.start..end);
                if let Some(open) = fence.take() {
                    fences.push(open.finish(end, true));
                }
            } else {
                open.body_end = Some(end);
            }
            continue;
        }

        if line.trim().is_empty() {
            if let Some(p) = paragraph.take() {
                paragraphs.push(p);
            }
            prev_blank = true;
            continue;
        }

        if is_indented(line) && (indented.is_some() || (prev_blank && !in_list)) {
            indented = Some(indented.map_or(start..end, |r| r.start..end));
            prev_blank = false;
            continue;
        }
        if let Some(block) = indented.take() {
            regions.push(block);
        }

        let (prefix, list_item) = container_prefix(line);
        if list_item {
            in_list = true;
        } else if prev_blank && !line.starts_with([' ', '\t']) {
            in_list = false;
        }

        let rest = &line[prefix..];
        let indent = rest.len() - rest.trim_start().len();
        if indent <= 3 || in_list || prefix > 0 {
            if let Some((marker, len)) = opening_fence(&rest[indent..]) {
                if let Some(p) = paragraph.take() {
                    paragraphs.push(p);
                }
                // A fence at column 0 ends any open list.
                if prefix == 0 && indent == 0 {
                    in_list = false;
                }
                let marker_start = start + prefix + indent;
                fence = Some(OpenFence {
                    marker,
                    len,
                    start: marker_start,
                    info: marker_start + len..end,
                    body_start: offset,
                    body_end: None,
                    indent,
                    top_level: prefix == 0 && indent <= 3 && !in_list,
                });
                prev_blank = false;
                continue;
            }
        }

        paragraph = Some(paragraph.map_or(start..end, |p| p.start..end));
        prev_blank = false;
    }

    // Unclosed fences run to the end of the document.
    if let Some(open) = fence {
        regions.push(open.start..text.len());
        fences.push(open.finish(text.len(), false));
    }
    if let Some(block) = indented {
        regions.push(block);
    }
    if let Some(p) = paragraph {
        paragraphs.push(p);
    }

    for p in paragraphs {
        inline_code_spans(text, p, &mut regions);
    }

    regions.sort_by_key(|r| r.start);
    (regions, fences)
}

/// Length of the blockquote/list-marker prefix of `line`, and whether it
/// ends with a list item marker.
fn container_prefix(line: &str) -> (usize, bool) {
    let bytes = line.as_bytes();
    let mut pos = 0;

    loop {
        let spaces = bytes[pos..].iter().take(3).take_while(|&&b| b == b' ').count();
        if bytes.get(pos + spaces) == Some(&b'>') {
            pos += spaces + 1;
            if bytes.get(pos) == Some(&b' ') {
                pos += 1;
            }
        } else {
            break;
        }
    }

    let spaces = bytes[pos..].iter().take(3).take_while(|&&b| b == b' ').count();
    let marker_at = pos + spaces;
    let marker_len = match bytes.get(marker_at) {
        Some(b'-' | b'*' | b'+') => 1,
        Some(b) if b.is_ascii_digit() => {
            let digits = bytes[marker_at..].iter().take_while(|b| b.is_ascii_digit()).count();
            match bytes.get(marker_at + digits) {
                Some(b'.' | b')') if digits <= 9 => digits + 1,
                _ => 0,
            }
        }
        _ => 0,
    };

    if marker_len > 0 {
        match bytes.get(marker_at + marker_len) {
            Some(b' ' | b'\t') => return (marker_at + marker_len + 1, true),
            None => return (marker_at + marker_len, true),
            _ => {}
        }
    }

    (pos, false)
}

fn opening_fence(s: &str) -> Option<(u8, usize)> {
    let marker = *s.as_bytes().first()?;
    if marker != b'`' && marker != b'~' {
        return None;
    }
    let len = s.bytes().take_while(|&b| b == marker).count();
    if len < 3 {
        return None;
    }
    // Backtick fence info strings may not contain backticks.
    if marker == b'`' && s[len..].contains('`') {
        return None;
    }
    Some((marker, len))
}

fn is_closing_fence(line: &str, open: &OpenFence) -> bool {
    let mut rest = line.trim_start();
    while let Some(stripped) = rest.strip_prefix('>') {
        rest = stripped.trim_start();
    }
    let run = rest.bytes().take_while(|&b| b == open.marker).count();
    run >= open.len && rest[run..].trim().is_empty()
}

fn inline_code_spans(text: &str, range: Range<usize>, regions: &mut Vec<Range<usize>>) {
    let bytes = text.as_bytes();
    let mut i = range.start;

    while i < range.end {
        if bytes[i] != b'`' {
            i += 1;
            continue;
        }

        let open_start = i;
        while i < range.end && bytes[i] == b'`' {
            i += 1;
        }
        let open_len = i - open_start;
        if open_start > range.start && bytes[open_start - 1] == b'\\' {
            continue;
        }

        let mut j = i;
        while j < range.end {
            if bytes[j] != b'`' {
                j += 1;
                continue;
            }
            let close_start = j;
            while j < range.end && bytes[j] == b'`' {
                j += 1;
            }
            if j - close_start == open_len {
                regions.push(open_start..j);
                i = j;
                break;
            }
        }
    }
}

fn invert(regions: &[Range<usize>], len: usize) -> Vec<Range<usize>> {
    let mut safe = Vec::with_capacity(regions.len() + 1);
    let mut cursor = 0;
    for region in regions {
        if region.start > cursor {
            safe.push(cursor..region.start);
        }
        cursor = cursor.max(region.end);
    }
    if cursor < len {
        safe.push(cursor..len);
    }
    safe
}
