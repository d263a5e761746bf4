//! Markdown scanning and import directive parsing.
//!
//! Directives are only recognized outside code. The [`scanner`] computes the
//! spans of a document that are not inside fenced, indented or inline code,
//! and the [`parser`] uses those spans to turn the document into an ordered,
//! non-overlapping list of [`ImportAction`](crate::imports::ImportAction)s.
//!
//! # Example
//!
//! ```rust
//! use mdimport::markdown::{parse_imports, scan_safe_ranges};
//!
//! let text = "Intro @./intro.md\n\n```\n@./not-an-import.md\n```\n";
//! let safe = scan_safe_ranges(text);
//! assert!(safe.contains(6));
//!
//! let actions = parse_imports(text);
//! assert_eq!(actions.len(), 1);
//! assert_eq!(actions[0].kind(), "file");
//! ```

pub mod parser;
pub mod scanner;

pub use parser::parse_imports;
pub use scanner::{SafeRanges, scan_safe_ranges};
