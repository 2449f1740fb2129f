//! Idempotent-retry wrapper for mutating external calls.
//!
//! Only [`ErrorKind::Operational`](deckhand_core::ErrorKind::Operational)
//! failures are retried. Configuration, unrecoverable and cancellation errors
//! surface on the attempt that raised them.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use deckhand_core::{Error, Result};

use crate::cancel::CancelToken;

/// Backoff and attempt limits for [`retry_idempotent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts before giving up; `None` retries until success or cancel.
    pub max_attempts: Option<u32>,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub use_jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(5),
            base_backoff_ms: 250,
            max_backoff_ms: 30_000,
            use_jitter: true,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_attempts: Option<u32>, base_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_attempts,
            base_backoff_ms,
            max_backoff_ms,
            use_jitter: true,
        }
    }

    /// Retry until success or cancellation.
    #[must_use]
    pub const fn unbounded(mut self) -> Self {
        self.max_attempts = None;
        self
    }

    #[must_use]
    pub const fn without_jitter(mut self) -> Self {
        self.use_jitter = false;
        self
    }

    /// Delay after the failed `attempt` (1-based): doubles each time, capped,
    /// then spread by up to 25 % either way when jitter is on.
    #[must_use]
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_backoff_ms
            .saturating_mul(2_u64.saturating_pow(attempt.saturating_sub(1)));
        let capped = exponential.min(self.max_backoff_ms);

        if self.use_jitter {
            let jitter_range = (capped / 4).max(1);
            let jitter = rand::random::<u64>() % jitter_range.saturating_mul(2);
            Duration::from_millis(capped.saturating_sub(jitter_range).saturating_add(jitter))
        } else {
            Duration::from_millis(capped)
        }
    }

    /// Check whether another attempt is allowed after `attempt` failed.
    #[must_use]
    pub fn allows_retry(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt < max)
    }
}

/// Bookkeeping for one wrapped call.
#[derive(Debug, Default)]
pub struct RetryContext {
    /// Attempts made so far.
    pub attempt: u32,
    /// Last operational error observed.
    pub last_error: Option<Error>,
    /// Delay before the next attempt.
    pub delay: Duration,
}

/// Run `call` until it succeeds, retrying operational failures.
///
/// `call` must be idempotent: it may run several times for one logical
/// mutation. Exhaustion returns the last operational error. Cancellation is
/// checked before every backoff sleep and interrupts the sleep itself.
pub async fn retry_idempotent<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancelToken,
    operation: &str,
    mut call: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut ctx = RetryContext::default();

    loop {
        ctx.attempt = ctx.attempt.saturating_add(1);

        match call().await {
            Ok(value) => {
                if let Some(recovered) = &ctx.last_error {
                    debug!(operation, attempts = ctx.attempt, %recovered, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                if !policy.allows_retry(ctx.attempt) {
                    warn!(operation, attempts = ctx.attempt, error = %e, "Giving up");
                    return Err(e);
                }

                ctx.delay = policy.calculate_backoff(ctx.attempt);
                warn!(
                    operation,
                    attempt = ctx.attempt,
                    retry_in_ms = ctx.delay.as_millis(),
                    error = %e,
                    "Transient failure, retrying"
                );
                ctx.last_error = Some(e);

                cancel.sleep(ctx.delay).await?;
            }
        }
    }
}
