//! Backoff building blocks for the turn loop's retry wrapper.
//!
//! Throttling and output-cap escalation are retried with a uniformly random
//! one-to-five-second delay; the portable math lives here, the async sleep at
//! the call site.

/// Maximum retry attempts for a single LLM invocation.
pub const LLM_RETRY_MAX_ATTEMPTS: u32 = 100;

/// Output-cap escalations allowed before the turn aborts.
pub const MAX_TOKENS_ESCALATION_LIMIT: u32 = 5;

/// Lower bound of the retry delay in milliseconds.
pub const RETRY_DELAY_MIN_MS: u64 = 1_000;

/// Upper bound of the retry delay in milliseconds.
pub const RETRY_DELAY_MAX_MS: u64 = 5_000;

/// Map a uniform random value in `[0.0, 1.0)` onto the retry delay range.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn retry_delay_ms(random: f64) -> u64 {
    let span = (RETRY_DELAY_MAX_MS - RETRY_DELAY_MIN_MS) as f64;
    RETRY_DELAY_MIN_MS + (random.clamp(0.0, 1.0) * span).round() as u64
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
