//! Bounded exponential-backoff retry policy.

use std::time::Duration;

/// Retry schedule applied uniformly to every network operation.
///
/// An operation gets `max_attempts` tries; the delay before attempt
/// `k + 1` is `base_delay * 2^k`. Only transient failures are retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay to sleep before the given attempt (1-based retry index:
    /// `attempt` 1 is the first retry).
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}
