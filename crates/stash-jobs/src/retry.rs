//! Bounded exponential backoff for purge side effects.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use stash_core::defaults::{PURGE_BACKOFF_MAX_MS, PURGE_BACKOFF_MS, PURGE_MAX_ATTEMPTS};
use stash_core::Result;

/// Retry policy: `max_attempts` tries, sleeping `base_delay * 2^(n-1)`
/// (capped at `max_delay`) after the n-th failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: PURGE_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(PURGE_BACKOFF_MS),
            max_delay: Duration::from_millis(PURGE_BACKOFF_MAX_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            ..Default::default()
        }
    }

    /// Backoff after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Run `op` until it succeeds or the attempts run out. Returns the last
    /// error together with the number of attempts made.
    pub async fn run<F, Fut, T>(&self, op_name: &str, mut op: F) -> (Result<T>, u32)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return (Ok(value), attempt),
                Err(e) if attempt >= self.max_attempts => return (Err(e), attempt),
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        op = op_name,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
