//! Content-type policy for URL imports.
//!
//! A fetched body is accepted when its declared media type is markdown,
//! plain text or JSON. When the server declares nothing useful (no header or
//! a generic octet-stream type), the body itself is inspected.

use serde_json::Value;

/// What a fetched body was accepted as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Markdown, declared or inferred
    Markdown,
    /// Plain text
    Text,
    /// JSON, declared or inferred
    Json,
}

const GENERIC_TYPES: &[&str] = &["application/octet-stream", "binary/octet-stream"];

/// Classify a fetched body.
///
/// Returns the rejected content type as the error so the caller can build an
/// unsupported-content-type error.
///
/// ```rust
/// use mdimport::imports::url::{ContentKind, classify_content};
///
/// let kind = classify_content("https://x.dev/a", Some("text/markdown; charset=utf-8"), "# Hi");
/// assert_eq!(kind, Ok(ContentKind::Markdown));
/// assert!(classify_content("https://x.dev/a", Some("text/html"), "<html>").is_err());
/// ```
pub fn classify_content(
    url: &str,
    content_type: Option<&str>,
    body: &str,
) -> Result<ContentKind, String> {
    let media_type = content_type
        .map(|ct| ct.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty());

    match media_type.as_deref() {
        Some(ct) if !GENERIC_TYPES.contains(&ct) => {
            allowed_media_type(ct).ok_or_else(|| ct.to_string())
        }
        declared => infer_from_body(url, body)
            .ok_or_else(|| declared.unwrap_or("unknown").to_string()),
    }
}

fn allowed_media_type(media_type: &str) -> Option<ContentKind> {
    match media_type {
        "text/markdown" | "text/x-markdown" => Some(ContentKind::Markdown),
        "text/plain" => Some(ContentKind::Text),
        "application/json" | "text/json" => Some(ContentKind::Json),
        ct if ct.starts_with("application/") && ct.ends_with("+json") => Some(ContentKind::Json),
        _ => None,
    }
}

fn infer_from_body(url: &str, body: &str) -> Option<ContentKind> {
    if serde_json::from_str::<Value>(body).is_ok() {
        return Some(ContentKind::Json);
    }

    let head = body.trim_start();
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    let looks_markdown = head.starts_with('#')
        || starts_with_list_marker(head)
        || head.starts_with("```")
        || path.ends_with(".md")
        || path.ends_with(".markdown");

    looks_markdown.then_some(ContentKind::Markdown)
}

/// `- `, `* `, `+ `, or an ordered marker such as `1. ` / `2) `.
fn starts_with_list_marker(head: &str) -> bool {
    if head.starts_with(['-', '*', '+']) {
        return head[1..].starts_with([' ', '\t']);
    }
    let digits = head.bytes().take_while(u8::is_ascii_digit).count();
    (1..=9).contains(&digits)
        && head[digits..].starts_with(['.', ')'])
        && head[digits + 1..].starts_with([' ', '\t'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_types() {
        assert_eq!(
            classify_content("https://a/b", Some("text/plain"), "x"),
            Ok(ContentKind::Text)
        );
        assert_eq!(
            classify_content("https://a/b", Some("application/vnd.api+json"), "{}"),
            Ok(ContentKind::Json)
        );
        assert_eq!(
            classify_content("https://a/b", Some("text/html; charset=utf-8"), "# looks like md"),
            Err("text/html".to_string())
        );
    }

    #[test]
    fn test_inference_for_missing_or_generic_type() {
        assert_eq!(
            classify_content("https://a/data", None, "{\"a\": 1}"),
            Ok(ContentKind::Json)
        );
        assert_eq!(
            classify_content("https://a/x", Some("application/octet-stream"), "- item"),
            Ok(ContentKind::Markdown)
        );
        assert_eq!(
            classify_content("https://a/README.md?raw=1", None, "plain words"),
            Ok(ContentKind::Markdown)
        );
    }

    #[test]
    fn test_inference_list_markers() {
        for body in ["+ item", "1. first", "12) twelfth", "* star", "-\ttabbed"] {
            assert_eq!(
                classify_content("https://a/notes", None, body),
                Ok(ContentKind::Markdown),
                "{body:?}"
            );
        }
        for body in ["+1 vote", "1.5 liters", "2024-01-01 log", "-dash"] {
            assert!(classify_content("https://a/notes", None, body).is_err(), "{body:?}");
        }
    }

    #[test]
    fn test_inference_rejects_unknown_body() {
        assert_eq!(
            classify_content("https://a/blob", Some("application/octet-stream"), "\u{1}\u{2}"),
            Err("application/octet-stream".to_string())
        );
        assert_eq!(
            classify_content("https://a/page", None, "<html></html>"),
            Err("unknown".to_string())
        );
    }
}
