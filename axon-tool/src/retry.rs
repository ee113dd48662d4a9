//! Retry policy — exponential backoff with full jitter.

use rand::Rng;
use std::time::Duration;

/// Retry tuning for transient tool failures.
///
/// Delays use *full jitter*: each retry sleeps a uniformly random duration
/// in `[0, base · 2^attempt]`, capped at [`backoff_max`](Self::backoff_max).
/// Jittering the whole range (rather than a fraction around the midpoint)
/// spreads retry storms from many concurrent callers.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = one attempt only).
    pub max_retries: u32,
    /// Backoff base.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(100),
            backoff_max: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// The jittered delay before retrying after `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let ceiling = self.ceiling_for(attempt);
        if ceiling.is_zero() {
            return Duration::ZERO;
        }
        let ms = rand::thread_rng().gen_range(0..=ceiling.as_millis() as u64);
        Duration::from_millis(ms)
    }

    /// The un-jittered ceiling for `attempt`: `base · 2^attempt`, capped.
    pub fn ceiling_for(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let factor = 1u64.checked_shl(attempt.min(32)).unwrap_or(u64::MAX);
        let ms = base_ms.saturating_mul(factor);
        Duration::from_millis(ms).min(self.backoff_max)
    }
}
