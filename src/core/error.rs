//! Error handling for mdimport
//!
//! This module provides the error taxonomy of the import engine and a
//! user-friendly wrapper for CLI display. The error system is designed around
//! two core principles:
//! 1. **Strongly-typed errors** so callers can react to a specific failure mode
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Error Categories
//!
//! - **Not found**: [`ImportError::FileNotFound`], [`ImportError::SymbolNotFound`]
//! - **Type rejected**: [`ImportError::BinaryFile`], [`ImportError::UnsupportedContentType`]
//! - **Cycle detected**: [`ImportError::CircularImport`]
//! - **Budget exceeded**: [`ImportError::BudgetExceeded`]
//! - **Environment failures**: [`ImportError::Io`], [`ImportError::Network`],
//!   [`ImportError::Execution`], [`ImportError::Cache`]
//!
//! Every error raised while resolving a directive carries the directive's
//! original text and its byte offset in the document, so the message always
//! points at the import that failed.
//!
//! # Examples
//!
//! ```rust,no_run
//! use mdimport::core::{ImportError, user_friendly_error};
//!
//! let error = ImportError::FileNotFound {
//!     path: "./missing.md".to_string(),
//!     directive: "@./missing.md".to_string(),
//!     index: 12,
//! };
//!
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display(); // Shows colored error with suggestions
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for import resolution.
///
/// Action-scoped variants carry `directive` (the exact matched source text)
/// and `index` (its byte offset), which are rendered in the message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    /// The imported file does not exist.
    #[error("File not found: {path} (from `{directive}` at offset {index})")]
    FileNotFound {
        /// The resolved path that was looked up
        path: String,
        /// Original directive text
        directive: String,
        /// Byte offset of the directive
        index: usize,
    },

    /// No declaration with the requested name exists in the file.
    #[error("Symbol '{symbol}' not found in {path} (from `{directive}` at offset {index})")]
    SymbolNotFound {
        /// The symbol that was requested
        symbol: String,
        /// File that was searched
        path: String,
        /// Original directive text
        directive: String,
        /// Byte offset of the directive
        index: usize,
    },

    /// The imported file contains binary data.
    #[error("Cannot import binary file: {path} (from `{directive}` at offset {index})")]
    BinaryFile {
        /// Path of the binary file
        path: String,
        /// Original directive text
        directive: String,
        /// Byte offset of the directive
        index: usize,
    },

    /// A URL returned content that is neither markdown, plain text nor JSON.
    #[error(
        "Unsupported content type '{content_type}' for {url} (from `{directive}` at offset {index})"
    )]
    UnsupportedContentType {
        /// The fetched URL
        url: String,
        /// Declared or inferred content type
        content_type: String,
        /// Original directive text
        directive: String,
        /// Byte offset of the directive
        index: usize,
    },

    /// A file import closes a loop along the current expansion chain.
    ///
    /// `chain` renders the full path, e.g. `a.md -> b.md -> a.md`.
    #[error("Circular import detected: {chain} (from `{directive}` at offset {index})")]
    CircularImport {
        /// String representation of the import chain
        chain: String,
        /// Original directive text
        directive: String,
        /// Byte offset of the directive
        index: usize,
    },

    /// The expanded document is larger than the configured maximum.
    #[error("Token budget exceeded: {tokens} tokens (maximum {max})")]
    BudgetExceeded {
        /// Counted or estimated tokens
        tokens: usize,
        /// The configured maximum
        max: usize,
        /// Whether `tokens` comes from the exact tokenizer
        exact: bool,
    },

    /// Reading, sniffing or canonicalizing a local path failed.
    #[error("Failed to access {path}: {reason} (from `{directive}` at offset {index})")]
    Io {
        /// Path being accessed
        path: String,
        /// Underlying failure
        reason: String,
        /// Original directive text
        directive: String,
        /// Byte offset of the directive
        index: usize,
    },

    /// Fetching a URL failed.
    #[error("Failed to fetch {url}: {reason} (from `{directive}` at offset {index})")]
    Network {
        /// The URL being fetched
        url: String,
        /// Underlying failure
        reason: String,
        /// Original directive text
        directive: String,
        /// Byte offset of the directive
        index: usize,
    },

    /// An inline command or executable fence could not be run.
    #[error("Failed to execute {command}: {reason} (from `{directive}` at offset {index})")]
    Execution {
        /// The command line or interpreter
        command: String,
        /// Underlying failure
        reason: String,
        /// Original directive text
        directive: String,
        /// Byte offset of the directive
        index: usize,
    },

    /// A throttle was constructed with zero permits.
    #[error("Concurrency throttle requires at least one permit (got {permits})")]
    InvalidThrottle {
        /// Requested permit count
        permits: usize,
    },

    /// The throttle's permit pool was closed while waiting.
    #[error("Concurrency throttle closed")]
    ThrottleClosed,

    /// Any other failure surfaced to the user (configuration, CLI I/O).
    #[error("{message}")]
    Other {
        /// Human-readable message
        message: String,
    },

    /// Content cache I/O failed.
    #[error("Cache error at {path}: {reason}")]
    Cache {
        /// Cache artifact path
        path: String,
        /// Underlying failure
        reason: String,
    },
}

impl ImportError {
    /// Directive text and offset for action-scoped errors.
    #[must_use]
    pub fn directive(&self) -> Option<(&str, usize)> {
        match self {
            Self::FileNotFound { directive, index, .. }
            | Self::SymbolNotFound { directive, index, .. }
            | Self::BinaryFile { directive, index, .. }
            | Self::UnsupportedContentType { directive, index, .. }
            | Self::CircularImport { directive, index, .. }
            | Self::Io { directive, index, .. }
            | Self::Network { directive, index, .. }
            | Self::Execution { directive, index, .. } => Some((directive.as_str(), *index)),
            Self::BudgetExceeded { .. }
            | Self::InvalidThrottle { .. }
            | Self::ThrottleClosed
            | Self::Other { .. }
            | Self::Cache { .. } => None,
        }
    }

    /// Short category label matching the error taxonomy.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::FileNotFound { .. } | Self::SymbolNotFound { .. } => "not-found",
            Self::BinaryFile { .. } | Self::UnsupportedContentType { .. } => "type-rejected",
            Self::CircularImport { .. } => "cycle-detected",
            Self::BudgetExceeded { .. } => "budget-exceeded",
            Self::Execution { .. } => "tool-failure",
            Self::Io { .. }
            | Self::Network { .. }
            | Self::InvalidThrottle { .. }
            | Self::ThrottleClosed
            | Self::Other { .. }
            | Self::Cache { .. } => "environment",
        }
    }
}

/// Error context wrapper that provides user-friendly error information
///
/// `ErrorContext` wraps an [`ImportError`] and adds optional suggestions and
/// details that help users understand and resolve the failure.
///
/// # Examples
///
/// ```rust,no_run
/// use mdimport::core::{ErrorContext, ImportError};
///
/// let error = ImportError::InvalidThrottle { permits: 0 };
/// let context = ErrorContext::new(error)
///     .with_suggestion("Pass --max-parallel 1 or higher")
///     .with_details("The throttle needs at least one permit to make progress");
///
/// context.display();
/// ```
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying import error
    pub error: ImportError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: ImportError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into a user-friendly [`ErrorContext`].
///
/// Known [`ImportError`]s get a tailored suggestion; anything else is shown
/// with its full `anyhow` cause chain as details.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(import_error) = error.downcast_ref::<ImportError>() {
        return create_error_context(import_error.clone());
    }

    let details = format!("{error:#}");
    ErrorContext::new(ImportError::Other {
        message: error.to_string(),
    })
    .with_details(details)
}

fn create_error_context(error: ImportError) -> ErrorContext {
    match &error {
        ImportError::FileNotFound { path, .. } => {
            let details = format!("Relative imports resolve against the importing file's directory ({path})");
            ErrorContext::new(error)
                .with_suggestion("Check the path spelling or use an absolute path")
                .with_details(details)
        }
        ImportError::SymbolNotFound { symbol, .. } => {
            let suggestion = format!(
                "Make sure '{symbol}' is declared as an interface, type, function, class, const/let/var or enum"
            );
            ErrorContext::new(error).with_suggestion(suggestion)
        }
        ImportError::BinaryFile { .. } => ErrorContext::new(error)
            .with_suggestion("Only text files can be imported; reference binary assets by path instead"),
        ImportError::UnsupportedContentType { .. } => ErrorContext::new(error)
            .with_suggestion("URL imports accept markdown, plain text and JSON only")
            .with_details("Serve the resource with a text/markdown, text/plain or application/json content type"),
        ImportError::CircularImport { chain, .. } => {
            let details = format!(
                "Import chain: {chain}. A file cannot import itself directly or indirectly"
            );
            ErrorContext::new(error)
                .with_suggestion("Remove one of the imports that closes the loop")
                .with_details(details)
        }
        ImportError::BudgetExceeded { .. } => ErrorContext::new(error)
            .with_suggestion("Narrow the imports (line ranges, symbols) or pass --allow-large to override"),
        ImportError::Network { .. } => ErrorContext::new(error)
            .with_suggestion("Check your network connection and the URL"),
        ImportError::Execution { .. } => ErrorContext::new(error)
            .with_suggestion("Run the command manually to check that it exists and terminates"),
        ImportError::InvalidThrottle { .. } => {
            ErrorContext::new(error).with_suggestion("Use a parallelism of 1 or higher")
        }
        ImportError::Cache { .. } => ErrorContext::new(error)
            .with_suggestion("Run 'mdimport cache clear' or set MDIMPORT_CACHE_DIR to a writable directory"),
        ImportError::Io { .. } | ImportError::ThrottleClosed | ImportError::Other { .. } => {
            ErrorContext::new(error)
        }
    }
}
