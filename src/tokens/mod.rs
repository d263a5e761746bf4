//! Token counting and the expanded-document budget.
//!
//! Counting has two paths. [`estimate_tokens`] is a fixed chars-per-token
//! ratio that costs nothing. [`count_tokens`] runs the cl100k BPE tokenizer,
//! which is exact but slow on large documents. [`TokenBudget::check`] only
//! pays for the exact count when the estimate lands close enough to the
//! maximum for the answer to be in doubt.
//!
//! # Usage
//!
//! ```rust
//! use mdimport::tokens::{BudgetStatus, TokenBudget};
//!
//! let budget = TokenBudget::new(50_000, 150_000);
//! let report = budget.check("Hello, world!").unwrap();
//! assert_eq!(report.status, BudgetStatus::WithinBudget);
//! assert!(!report.exact);
//! ```

use crate::constants::{
    CHARS_PER_TOKEN, DEFAULT_MAX_TOKENS, DEFAULT_WARN_TOKENS, EXACT_COUNT_LOWER_MARGIN,
    EXACT_COUNT_UPPER_MARGIN,
};
use crate::core::ImportError;
use std::sync::{Mutex, OnceLock};
use tiktoken_rs::{CoreBPE, cl100k_base};

/// The cached tokenizer, or `None` if it failed to load.
fn get_tokenizer() -> Option<&'static Mutex<CoreBPE>> {
    static TOKENIZER: OnceLock<Option<Mutex<CoreBPE>>> = OnceLock::new();
    TOKENIZER
        .get_or_init(|| match cl100k_base() {
            Ok(bpe) => Some(Mutex::new(bpe)),
            Err(e) => {
                tracing::warn!("Failed to load cl100k tokenizer, using estimates: {e}");
                None
            }
        })
        .as_ref()
}

/// Count tokens in content using cl100k encoding.
///
/// Falls back to [`estimate_tokens`] if the tokenizer cannot be loaded.
///
/// ```rust,no_run
/// use mdimport::tokens::count_tokens;
///
/// let tokens = count_tokens("Hello, world!");
/// assert!(tokens > 0);
/// ```
#[must_use]
pub fn count_tokens(content: &str) -> usize {
    get_tokenizer()
        .and_then(|bpe| bpe.lock().ok().map(|bpe| bpe.encode_ordinary(content).len()))
        .unwrap_or_else(|| estimate_tokens(content))
}

/// Cheap token estimate: characters divided by the chars-per-token ratio, rounded up.
#[must_use]
pub fn estimate_tokens(content: &str) -> usize {
    content.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Format a token count for human-readable display.
///
/// ```rust
/// use mdimport::tokens::format_token_count;
///
/// assert_eq!(format_token_count(500), "500");
/// assert_eq!(format_token_count(1500), "1.5k");
/// assert_eq!(format_token_count(1500000), "1.5M");
/// ```
#[must_use]
pub fn format_token_count(count: usize) -> String {
    if count >= 1_000_000 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.1}k", count as f64 / 1_000.0)
    } else {
        count.to_string()
    }
}

/// Outcome of a budget check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetStatus {
    /// At or under the warn threshold
    WithinBudget,
    /// Over the warn threshold, or over the max with the override set
    Warning,
}

/// Size of a checked document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetReport {
    /// Estimated or exact token count
    pub tokens: usize,
    /// Whether `tokens` came from the tokenizer
    pub exact: bool,
    /// Outcome
    pub status: BudgetStatus,
}

/// Warn and max thresholds for a fully expanded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBudget {
    /// Tokens above which a warning is logged
    pub warn_threshold: usize,
    /// Tokens above which expansion fails
    pub max_threshold: usize,
    /// Log instead of failing past `max_threshold`
    pub allow_exceed: bool,
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self::new(DEFAULT_WARN_TOKENS, DEFAULT_MAX_TOKENS)
    }
}

impl TokenBudget {
    /// Budget with the given thresholds and no override.
    #[must_use]
    pub const fn new(warn_threshold: usize, max_threshold: usize) -> Self {
        Self {
            warn_threshold,
            max_threshold,
            allow_exceed: false,
        }
    }

    /// Set whether exceeding the maximum is tolerated.
    #[must_use]
    pub const fn with_allow_exceed(mut self, allow_exceed: bool) -> Self {
        self.allow_exceed = allow_exceed;
        self
    }

    /// Check `text` against the budget using the cl100k tokenizer when needed.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::BudgetExceeded`] past `max_threshold` unless
    /// `allow_exceed` is set.
    pub fn check(&self, text: &str) -> Result<BudgetReport, ImportError> {
        self.check_with(text, count_tokens)
    }

    /// Check `text`, calling `exact` only when the estimate is within
    /// 80–120% of `max_threshold`.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::BudgetExceeded`] past `max_threshold` unless
    /// `allow_exceed` is set.
    pub fn check_with(
        &self,
        text: &str,
        exact: impl FnOnce(&str) -> usize,
    ) -> Result<BudgetReport, ImportError> {
        let estimate = estimate_tokens(text);
        let max = self.max_threshold as f64;
        let near_max = (estimate as f64) >= max * EXACT_COUNT_LOWER_MARGIN
            && (estimate as f64) <= max * EXACT_COUNT_UPPER_MARGIN;

        let (tokens, is_exact) = if near_max {
            (exact(text), true)
        } else {
            (estimate, false)
        };
        tracing::debug!(
            "Expanded document is {} tokens ({})",
            format_token_count(tokens),
            if is_exact { "exact" } else { "estimated" }
        );

        if tokens > self.max_threshold {
            if !self.allow_exceed {
                return Err(ImportError::BudgetExceeded {
                    tokens,
                    max: self.max_threshold,
                    exact: is_exact,
                });
            }
            tracing::warn!(
                "Expanded document is {} tokens, over the {} maximum (override in effect)",
                format_token_count(tokens),
                format_token_count(self.max_threshold)
            );
        } else if tokens > self.warn_threshold {
            tracing::warn!(
                "Expanded document is {} tokens, over the {} warning threshold",
                format_token_count(tokens),
                format_token_count(self.warn_threshold)
            );
        }

        let status = if tokens > self.warn_threshold {
            BudgetStatus::Warning
        } else {
            BudgetStatus::WithinBudget
        };
        Ok(BudgetReport {
            tokens,
            exact: is_exact,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_count_tokens_empty() {
        assert_eq!(count_tokens(""), 0);
    }

    #[test]
    fn test_count_tokens_simple() {
        let count = count_tokens("Hello, world!");
        assert!(count > 0);
        assert!(count < 10);
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_format_token_count() {
        assert_eq!(format_token_count(999), "999");
        assert_eq!(format_token_count(12500), "12.5k");
        assert_eq!(format_token_count(10_000_000), "10.0M");
    }

    #[test]
    fn test_estimate_below_margin_skips_exact_count() {
        let calls = Cell::new(0);
        let budget = TokenBudget::new(10, 100);
        // 79 estimated tokens: below 80% of the maximum.
        let text = "x".repeat(79 * CHARS_PER_TOKEN);

        let report = budget
            .check_with(&text, |_| {
                calls.set(calls.get() + 1);
                0
            })
            .unwrap();

        assert_eq!(calls.get(), 0);
        assert_eq!(report.tokens, 79);
        assert!(!report.exact);
        assert_eq!(report.status, BudgetStatus::Warning);
    }

    #[test]
    fn test_estimate_near_max_uses_exact_count() {
        let budget = TokenBudget::new(10, 100);
        let text = "x".repeat(110 * CHARS_PER_TOKEN);

        let report = budget.check_with(&text, |_| 95).unwrap();
        assert!(report.exact);
        assert_eq!(report.tokens, 95);

        let err = budget.check_with(&text, |_| 105).unwrap_err();
        assert_eq!(
            err,
            ImportError::BudgetExceeded {
                tokens: 105,
                max: 100,
                exact: true
            }
        );
    }

    #[test]
    fn test_far_over_max_without_exact_count() {
        let budget = TokenBudget::new(10, 100);
        let text = "x".repeat(500 * CHARS_PER_TOKEN);

        let err = budget.check_with(&text, |_| unreachable!()).unwrap_err();
        assert!(matches!(err, ImportError::BudgetExceeded { exact: false, .. }));

        let report = budget.with_allow_exceed(true).check_with(&text, |_| unreachable!()).unwrap();
        assert_eq!(report.status, BudgetStatus::Warning);
    }

    #[test]
    fn test_within_budget() {
        let report = TokenBudget::default().check("short").unwrap();
        assert_eq!(report.status, BudgetStatus::WithinBudget);
    }
}
