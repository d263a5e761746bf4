//! Brace-aware extraction of a named declaration from source text.
//!
//! The declaration line is found with a fixed set of patterns covering
//! interfaces, type aliases, functions, classes, `const`/`let`/`var`
//! bindings and enums, each optionally `export`ed, `default`, `declare`d,
//! `abstract` or `async`, and optionally generic. From there, bracket
//! nesting (`{}`, `()`, `[]`) is tracked while skipping string, template
//! literal and comment contents. The span closes on the first line where
//! nesting is back to zero and the statement plausibly ends.

use regex::Regex;

/// Extract the declaration of `symbol` from `content`.
///
/// Returns `None` when no declaration matches. An unbalanced declaration
/// extends to the end of the input.
///
/// # Examples
///
/// ```rust
/// use mdimport::imports::symbol::extract_symbol;
///
/// let source = "export interface User {\n  id: string;\n}\n\nconst other = 1;\n";
/// assert_eq!(
///     extract_symbol(source, "User").as_deref(),
///     Some("export interface User {\n  id: string;\n}")
/// );
/// ```
#[must_use]
pub fn extract_symbol(content: &str, symbol: &str) -> Option<String> {
    let declaration = declaration_regex(symbol)?;
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.iter().position(|line| declaration.is_match(line))?;

    let mut nesting = Nesting::default();
    for (i, line) in lines.iter().enumerate().skip(start) {
        nesting.feed(line);
        if nesting.is_closed() && ends_statement(line, lines.get(i + 1).copied()) {
            return Some(lines[start..=i].join("\n"));
        }
    }

    Some(lines[start..].join("\n"))
}

fn declaration_regex(symbol: &str) -> Option<Regex> {
    let pattern = format!(
        r"^\s*(?:export\s+)?(?:default\s+)?(?:declare\s+)?(?:abstract\s+)?(?:async\s+)?(?:const\s+)?(?:interface|type|function\s*\*?|class|const|let|var|enum)\s+{}(?:\s|<|\(|=|:|\{{|;|,|$)",
        regex::escape(symbol)
    );
    Regex::new(&pattern).ok()
}

/// Bracket depth plus lexical state carried across lines.
#[derive(Debug, Default)]
struct Nesting {
    depth: usize,
    in_template: bool,
    in_block_comment: bool,
}

impl Nesting {
    const fn is_closed(&self) -> bool {
        self.depth == 0 && !self.in_template && !self.in_block_comment
    }

    fn feed(&mut self, line: &str) {
        let mut quote: Option<char> = None;
        let mut chars = line.chars().peekable();

        while let Some(c) = chars.next() {
            if self.in_block_comment {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    self.in_block_comment = false;
                }
                continue;
            }
            if self.in_template {
                match c {
                    '\\' => {
                        chars.next();
                    }
                    '`' => self.in_template = false,
                    _ => {}
                }
                continue;
            }
            if let Some(q) = quote {
                match c {
                    '\\' => {
                        chars.next();
                    }
                    _ if c == q => quote = None,
                    _ => {}
                }
                continue;
            }

            match c {
                '\'' | '"' => quote = Some(c),
                '`' => self.in_template = true,
                '/' if chars.peek() == Some(&'/') => break,
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    self.in_block_comment = true;
                }
                '{' | '(' | '[' => self.depth += 1,
                '}' | ')' | ']' => self.depth = self.depth.saturating_sub(1),
                _ => {}
            }
        }
    }
}

/// Whether a line at depth zero closes the declaration.
fn ends_statement(line: &str, next: Option<&str>) -> bool {
    let line = line.trim_end();
    if line.ends_with(';') || line.ends_with('}') {
        return true;
    }
    if ["=", "=>", ",", "(", "|", "&"].iter().any(|s| line.ends_with(s)) {
        return false;
    }
    match next.map(str::trim_start) {
        Some(next) => !next.starts_with(['.', '{', '|', '&', '?', ':']),
        None => true,
    }
}
