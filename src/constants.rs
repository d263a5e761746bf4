//! Global constants used throughout the mdimport codebase.
//!
//! This module contains thresholds, ratios and parallelism defaults that are
//! shared between the resolver, the token budget guard and the configuration
//! layer. Defining them centrally keeps magic numbers discoverable.

use std::time::Duration;

/// Average number of characters per token used by the cheap token estimate.
///
/// Four characters per token is the usual rule of thumb for English prose with
/// BPE tokenizers of the cl100k family.
pub const CHARS_PER_TOKEN: usize = 4;

/// Lower bound (fraction of `max_threshold`) at which the exact tokenizer is consulted.
pub const EXACT_COUNT_LOWER_MARGIN: f64 = 0.8;

/// Upper bound (fraction of `max_threshold`) above which the estimate alone rejects.
pub const EXACT_COUNT_UPPER_MARGIN: f64 = 1.2;

/// Default token count past which a non-fatal warning is logged.
pub const DEFAULT_WARN_TOKENS: usize = 50_000;

/// Default token count past which expansion fails unless overridden.
pub const DEFAULT_MAX_TOKENS: usize = 150_000;

/// Number of leading bytes inspected when sniffing for binary content.
pub const BINARY_SNIFF_LEN: usize = 8 * 1024;

/// Default time-to-live for cached URL bodies (1 hour).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Default timeout for inline commands and executable fences (60 seconds).
///
/// A hung command would otherwise block the whole document expansion.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Minimum number of parallel operations regardless of CPU count.
///
/// Imports are I/O bound, so even single-core machines benefit from
/// several outstanding reads or fetches.
pub const MIN_PARALLELISM: usize = 10;

/// Multiplier applied to CPU core count for default parallelism.
pub const PARALLELISM_CORE_MULTIPLIER: usize = 2;

/// Default CPU core count when detection fails.
pub const FALLBACK_CORE_COUNT: usize = 4;

/// Default number of throttle permits: `max(MIN_PARALLELISM, cores × multiplier)`.
#[must_use]
pub fn default_parallelism() -> usize {
    let cores =
        std::thread::available_parallelism().map(|n| n.get()).unwrap_or(FALLBACK_CORE_COUNT);
    (cores * PARALLELISM_CORE_MULTIPLIER).max(MIN_PARALLELISM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_parallelism_has_floor() {
        assert!(default_parallelism() >= MIN_PARALLELISM);
    }

    #[test]
    fn test_exact_margins_bracket_max() {
        assert!(EXACT_COUNT_LOWER_MARGIN < 1.0);
        assert!(EXACT_COUNT_UPPER_MARGIN > 1.0);
    }
}
