//! Exponential backoff with jitter for remote delivery retries (spec §4.5).
//!
//! Kept close to the teacher's `calculate_next_retry_time`
//! (`empath-delivery/src/queue/retry.rs`): same formula, same saturating
//! overflow guard, only the default constants changed to match the gateway's
//! 1s/5min/±25% defaults instead of the mail queue's 1min/24h/±20%.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_retries: u32,
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
            max_retries: 5,
            jitter_factor: 0.25,
        }
    }
}

impl RetryPolicy {
    /// Delay before `attempt` (1-indexed), including jitter.
    ///
    /// `delay = min(base * 2^(attempt-1), max_delay) * (1 ± jitter_factor)`
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let base = self.base_delay.as_secs_f64();
        let capped = if exponent >= 63 {
            self.max_delay.as_secs_f64()
        } else {
            let multiplier = (1u64 << exponent) as f64;
            (base * multiplier).min(self.max_delay.as_secs_f64())
        };

        let mut rng = rand::rng();
        let jitter_range = capped * self.jitter_factor;
        let jitter: f64 = rng.random_range(-jitter_range..=jitter_range);
        Duration::from_secs_f64((capped + jitter).max(0.0))
    }
}
