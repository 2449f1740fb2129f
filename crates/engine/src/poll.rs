//! Condition-poll loop used by every "wait until X" actor.
//!
//! The loop evaluates a [`Condition`], sleeps a fixed interval while it is
//! false, and emits a "still waiting" notice at most once per status
//! interval. It has no iteration bound; only cancellation ends an
//! unsatisfied wait.

use std::future::Future;
use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info};

use deckhand_core::{Error, Result};

use crate::cancel::CancelToken;

/// Default delay between two evaluations.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(3);

/// Default delay between two "still waiting" notices.
pub const DEFAULT_STATUS_INTERVAL: Duration = Duration::from_secs(30);

/// A boolean condition over external state.
pub trait Condition: Send + Sync {
    /// Evaluate the condition once.
    fn check(&self) -> impl Future<Output = Result<bool>> + Send;
}

/// Adapts an async closure into a [`Condition`].
pub struct FnCondition<F> {
    func: F,
}

impl<F> FnCondition<F> {
    /// Wrap `func`.
    pub const fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F, Fut> Condition for FnCondition<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool>> + Send,
{
    fn check(&self) -> impl Future<Output = Result<bool>> + Send {
        (self.func)()
    }
}

/// Poll loop timing and messages.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between two evaluations.
    pub interval: Duration,
    /// Delay between two "still waiting" notices; `None` disables them.
    pub status_interval: Option<Duration>,
    /// Text of the "still waiting" notice.
    pub status_message: String,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_CHECK_INTERVAL,
            status_interval: Some(DEFAULT_STATUS_INTERVAL),
            status_message: "Still waiting".to_string(),
        }
    }
}

impl PollConfig {
    /// Create a config with default timings and the given notice text.
    pub fn new(status_message: impl Into<String>) -> Self {
        Self {
            status_message: status_message.into(),
            ..Self::default()
        }
    }

    /// Set the delay between evaluations.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set or disable the notice interval.
    #[must_use]
    pub const fn with_status_interval(mut self, status_interval: Option<Duration>) -> Self {
        self.status_interval = status_interval;
        self
    }
}

/// State of a finished poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollResult {
    /// Whether the condition was (or, in dry run, was assumed) true.
    pub satisfied: bool,
    /// The satisfied outcome was simulated because of dry run.
    pub simulated: bool,
    /// The loop stopped because the run was cancelled.
    pub cancelled: bool,
    /// Number of condition evaluations performed.
    pub evaluations: u32,
    /// Number of "still waiting" notices emitted.
    pub notices: u32,
    /// Time spent in the loop.
    pub elapsed: Duration,
}

impl PollResult {
    /// Turn a cancelled result into [`Error::Cancelled`].
    pub fn into_result(self) -> Result<Self> {
        if self.cancelled {
            Err(Error::Cancelled)
        } else {
            Ok(self)
        }
    }
}

struct LoopState {
    started: Instant,
    evaluations: u32,
    notices: u32,
}

impl LoopState {
    fn finish(&self, satisfied: bool, simulated: bool, cancelled: bool) -> PollResult {
        PollResult {
            satisfied,
            simulated,
            cancelled,
            evaluations: self.evaluations,
            notices: self.notices,
            elapsed: self.started.elapsed(),
        }
    }
}

/// Evaluate `condition` until it holds or `cancel` fires.
///
/// In dry run the condition is evaluated once; if it is false the loop
/// pretends it holds and returns immediately. Errors from the condition end
/// the loop and propagate.
pub async fn poll_until<C>(
    condition: &C,
    config: &PollConfig,
    dry_run: bool,
    cancel: &CancelToken,
) -> Result<PollResult>
where
    C: Condition,
{
    let mut state = LoopState {
        started: Instant::now(),
        evaluations: 0,
        notices: 0,
    };
    let mut notices = config.status_interval.map(|period| {
        let mut ticker = interval_at(state.started + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    });

    loop {
        if cancel.is_cancelled() {
            debug!(evaluations = state.evaluations, "Poll cancelled before evaluation");
            return Ok(state.finish(false, false, true));
        }

        let holds = condition.check().await?;
        state.evaluations = state.evaluations.saturating_add(1);

        if holds {
            debug!(evaluations = state.evaluations, "Condition satisfied");
            return Ok(state.finish(true, false, false));
        }

        if dry_run {
            info!("Pretending the condition is satisfied");
            return Ok(state.finish(true, true, false));
        }

        debug!(retry_in_ms = config.interval.as_millis(), "Condition not met");

        let wake = tokio::time::sleep(config.interval);
        tokio::pin!(wake);
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(evaluations = state.evaluations, "Poll cancelled while sleeping");
                    return Ok(state.finish(false, false, true));
                }
                () = next_notice(&mut notices) => {
                    state.notices = state.notices.saturating_add(1);
                    info!(
                        waited_secs = state.started.elapsed().as_secs(),
                        "{}",
                        config.status_message
                    );
                }
                () = &mut wake => break,
            }
        }
    }
}

async fn next_notice(notices: &mut Option<Interval>) {
    match notices {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Returns false until it has been evaluated `true_after` times.
    fn counting(true_after: u32) -> (Arc<AtomicU32>, impl Condition) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let condition = FnCondition::new(move || {
            let counter = Arc::clone(&counter);
            async move { Ok::<_, Error>(counter.fetch_add(1, Ordering::SeqCst) + 1 >= true_after) }
        });
        (calls, condition)
    }

    #[tokio::test(start_paused = true)]
    async fn test_false_twice_then_true() {
        let (calls, condition) = counting(3);
        let config = PollConfig::new("waiting");

        let result = poll_until(&condition, &config, false, &CancelToken::new()).await;

        let result = result.ok();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.map(|r| r.evaluations), Some(3));
        assert!(result.is_some_and(|r| r.satisfied && !r.simulated && !r.cancelled));
        assert_eq!(
            result.map(|r| r.elapsed),
            Some(DEFAULT_CHECK_INTERVAL * 2)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_second_evaluation() {
        let cancel = CancelToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let condition = {
            let cancel = cancel.clone();
            let calls = Arc::clone(&calls);
            FnCondition::new(move || {
                let cancel = cancel.clone();
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    cancel.cancel();
                    Ok::<_, Error>(false)
                }
            })
        };

        let result = poll_until(&condition, &PollConfig::default(), false, &cancel).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let result = result.ok();
        assert!(result.is_some_and(|r| r.cancelled && !r.satisfied));
        assert!(result.is_some_and(|r| r.into_result().is_err()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dry_run_pretends_after_one_evaluation() {
        let (calls, condition) = counting(u32::MAX);

        let result = poll_until(&condition, &PollConfig::default(), true, &CancelToken::new()).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let result = result.ok();
        assert!(result.is_some_and(|r| r.satisfied && r.simulated));
        assert_eq!(result.map(|r| r.elapsed), Some(Duration::ZERO));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dry_run_reports_real_success() {
        let (_calls, condition) = counting(1);
        let result = poll_until(&condition, &PollConfig::default(), true, &CancelToken::new()).await;
        assert!(result.is_ok_and(|r| r.satisfied && !r.simulated));
    }

    #[tokio::test(start_paused = true)]
    async fn test_condition_error_propagates() {
        let condition = FnCondition::new(|| async { Err::<bool, _>(Error::unrecoverable("no such elb")) });
        let result = poll_until(&condition, &PollConfig::default(), false, &CancelToken::new()).await;
        assert!(result.is_err_and(|e| e.is_fatal()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_notices_follow_their_own_interval() {
        let (calls, condition) = counting(10);
        let config = PollConfig::new("still waiting for test")
            .with_interval(Duration::from_secs(7))
            .with_status_interval(Some(Duration::from_secs(30)));

        let result = poll_until(&condition, &config, false, &CancelToken::new()).await;

        assert_eq!(calls.load(Ordering::SeqCst), 10);
        // Ten evaluations span 63 seconds: notices at 30s and 60s.
        assert_eq!(result.ok().map(|r| r.notices), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_long_wait() {
        let cancel = CancelToken::new();
        let (calls, condition) = counting(u32::MAX);
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            canceller.cancel();
        });

        let config = PollConfig::default().with_interval(Duration::from_secs(3600));
        let result = poll_until(&condition, &config, false, &cancel).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(result.is_ok_and(|r| r.cancelled && r.elapsed < Duration::from_secs(3600)));
    }
}
