//! Collection configuration constants

use std::time::Duration;

/// Default number of scroll batches per session.
pub const DEFAULT_SCROLL_BUDGET: u32 = 50;

/// Consecutive batches without a new record before the session ends as exhausted.
pub const DEFAULT_MAX_STALL: u32 = 3;

/// Maximum retries of a failed navigate or batch fetch.
/// 3 retries with exponential backoff wait at most 1 + 2 + 4 = 7 seconds.
pub const MAX_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 1000; // 1 second

/// Maximum backoff delay in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 30000; // 30 seconds

/// Upper bound for one navigate or batch fetch attempt.
pub const FETCH_TIMEOUT_SECS: u64 = 30;

/// Pause between batches so the front-end is not hammered.
pub const SCROLL_DELAY_MS: u64 = 1500;

/// Calculate exponential backoff delay
pub fn calculate_backoff(retry_count: u32) -> Duration {
    BackoffPolicy::default().delay(retry_count)
}

/// Exponential backoff curve, capped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the first retry
    pub initial: Duration,
    /// Largest delay ever returned
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(INITIAL_BACKOFF_MS),
            max: Duration::from_millis(MAX_BACKOFF_MS),
        }
    }
}

impl BackoffPolicy {
    /// Policy with explicit bounds
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }

    /// Delay before retry number `retry_count` (0-based)
    pub fn delay(&self, retry_count: u32) -> Duration {
        let factor = 2u32.checked_pow(retry_count).unwrap_or(u32::MAX);
        self.initial.saturating_mul(factor).min(self.max)
    }
}
