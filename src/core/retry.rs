//! Bounded retries with exponential backoff
//!
//! The delay before retry `n` (0-indexed) is `base_delay * 2^n`, capped at
//! `max_delay`. With defaults that is 1s then 2s across three attempts.
//! Only errors that report [`FetchError::is_retryable`] are retried, and the
//! last failure is returned unchanged.

use crate::error::{FetchError, Result};
use crate::types::AppConfig;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Default total attempts, including the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_secs(config.retry_base_delay_secs),
            Duration::from_secs(config.retry_max_delay_secs),
        )
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait before the retry that follows failed attempt `attempt_index`
    #[must_use]
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt_index);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Run `op` until it succeeds or attempts run out.
///
/// `op` receives the 0-indexed attempt number. Backoff sleeps are plain
/// timers; nothing short of runtime shutdown interrupts them.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        debug!(label, attempt = attempt + 1, "Attempt starting");
        let err: FetchError = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let remaining = policy.max_attempts.saturating_sub(attempt + 1);
        if !err.is_retryable() || remaining == 0 {
            return Err(err);
        }

        let delay = policy.delay_for(attempt);
        warn!(
            label,
            attempt = attempt + 1,
            max_attempts = policy.max_attempts,
            ?delay,
            "Attempt failed, retrying: {}",
            err
        );
        sleep(delay).await;
        attempt += 1;
    }
}
