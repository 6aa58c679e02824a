//! Backoff arithmetic shared by the flight controller.
//!
//! Two schedules are used:
//! - transient failures back off with [`exponential_backoff`]
//! - 429 responses use [`rate_limit_delay`], which prefers the server's
//!   `Retry-After` hint and is capped

use std::time::Duration;

/// Exponential backoff delay calculation
///
/// Returns `base_ms * 2^attempt`, with the exponent clamped at 10.
pub fn exponential_backoff(attempt: u32, base_ms: u64) -> Duration {
    let delay_ms = base_ms.saturating_mul(2_u64.pow(attempt.min(10)));
    Duration::from_millis(delay_ms)
}

/// Delay mandated after a 429.
///
/// Uses the server hint when present, else `min(base * 2^attempt, max)`.
pub fn rate_limit_delay(
    attempt: u32,
    retry_after: Option<Duration>,
    base_ms: u64,
    max_ms: u64,
) -> Duration {
    match retry_after {
        Some(hint) => hint,
        None => exponential_backoff(attempt, base_ms).min(Duration::from_millis(max_ms)),
    }
}
