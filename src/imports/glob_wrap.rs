//! Wrapping of glob matches into tagged blocks.
//!
//! Each matched file is wrapped in a synthetic tag named after a slug of its
//! file name, with the path as an attribute:
//!
//! ```text
//! <utils-ts path="src/utils.ts">
//! ...content...
//! </utils-ts>
//! ```
//!
//! The `path` attribute is escaped (`&`, `<`, `"`); file content is not.

use crate::env::GlobMatch;

/// Filesystem-safe tag name for a file name.
///
/// Lowercases, collapses runs of non-alphanumeric characters into a single
/// hyphen and trims hyphens from both ends. Names starting with a digit are
/// prefixed with `_`.
///
/// ```rust
/// use mdimport::imports::glob_wrap::slugify;
///
/// assert_eq!(slugify("My Notes.md"), "my-notes-md");
/// assert_eq!(slugify("2024_plan.md"), "_2024-plan-md");
/// ```
#[must_use]
pub fn slugify(file_name: &str) -> String {
    let mut slug = String::with_capacity(file_name.len());
    let mut pending_hyphen = false;

    for c in file_name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    if slug.is_empty() {
        return "file".to_string();
    }
    if slug.starts_with(|c: char| c.is_ascii_digit()) {
        slug.insert(0, '_');
    }
    slug
}

/// Wrap a single match in its tag.
#[must_use]
pub fn wrap_match(path: &str, content: &str) -> String {
    let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let tag = slugify(file_name);
    let path = escape_attribute(path);
    format!("<{tag} path=\"{path}\">\n{content}\n</{tag}>")
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Wrap every match and join them with a blank line.
#[must_use]
pub fn wrap_matches(matches: &[GlobMatch]) -> String {
    matches
        .iter()
        .map(|m| wrap_match(&m.path, &m.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("utils.ts"), "utils-ts");
        assert_eq!(slugify("README.md"), "readme-md");
        assert_eq!(slugify("--a__b--"), "a-b");
        assert_eq!(slugify("1st.md"), "_1st-md");
        assert_eq!(slugify("..."), "file");
    }

    #[test]
    fn test_wrap_matches() {
        let matches = vec![
            GlobMatch {
                path: "docs/a.md".to_string(),
                content: "alpha".to_string(),
            },
            GlobMatch {
                path: "docs/b.md".to_string(),
                content: "beta".to_string(),
            },
        ];
        assert_eq!(
            wrap_matches(&matches),
            "<a-md path=\"docs/a.md\">\nalpha\n</a-md>\n\n<b-md path=\"docs/b.md\">\nbeta\n</b-md>"
        );
    }

    #[test]
    fn test_path_attribute_is_escaped() {
        assert_eq!(
            wrap_match("docs/say \"hi\" & <bye>.md", "x"),
            "<say-hi-bye-md path=\"docs/say &quot;hi&quot; &amp; &lt;bye>.md\">\nx\n</say-hi-bye-md>"
        );
    }

    #[test]
    fn test_wrap_matches_empty() {
        assert_eq!(wrap_matches(&[]), "");
    }
}
