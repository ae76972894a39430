//! Reconnection and run-level retry policies.

use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

/// Socket reconnect budget used inside the stream reader.
///
/// Attempts are evenly spaced. The defaults (5 attempts, 5 seconds apart)
/// keep the whole budget under the ~30 second window after which the
/// service stops a job that has not seen a heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Maximum number of reconnect attempts after a transport failure.
    pub max_attempts: u32,
    /// Pause before every attempt.
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::fixed(5, Duration::from_secs(5))
    }
}

impl ReconnectPolicy {
    /// Policy with `max_attempts` attempts spaced `delay` apart.
    #[must_use]
    pub const fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Whether attempt number `attempt` (1-based) is within budget.
    #[must_use]
    pub const fn allows(&self, attempt: u32) -> bool {
        attempt >= 1 && attempt <= self.max_attempts
    }
}

/// Caller-facing retry of entire job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first run. `0` disables, negative retries forever.
    pub max_retries: i64,
    /// Pause between runs.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Create a run-level policy.
    #[must_use]
    pub const fn new(max_retries: i64, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Whether another run is allowed after `retries_done` retries.
    #[must_use]
    pub const fn allows_retry(&self, retries_done: u32) -> bool {
        if self.max_retries < 0 {
            return true;
        }
        (retries_done as i64) < self.max_retries
    }
}

/// Retry bookkeeping for one logical run.
///
/// The caller drives the loop so each attempt may borrow its writers
/// mutably:
///
/// ```rust,no_run
/// # use jut_client::{RetryPolicy, RunRetry};
/// # async fn attempt() -> Result<(), jut_client::ClientError> { Ok(()) }
/// # async fn example() -> Result<(), jut_client::ClientError> {
/// let mut retry = RunRetry::new(RetryPolicy::default());
/// loop {
///     match attempt().await {
///         Err(e) if e.is_transport() && retry.can_retry() => retry.wait(&e).await,
///         result => return result,
///     }
/// }
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RunRetry {
    policy: RetryPolicy,
    retries: u32,
}

impl RunRetry {
    /// Start with no retries spent.
    #[must_use]
    pub const fn new(policy: RetryPolicy) -> Self {
        Self { policy, retries: 0 }
    }

    /// Retries performed so far.
    #[must_use]
    pub const fn retries(&self) -> u32 {
        self.retries
    }

    /// Whether the policy allows another run.
    #[must_use]
    pub const fn can_retry(&self) -> bool {
        self.policy.allows_retry(self.retries)
    }

    /// Record a failed run and sleep before the next one.
    pub async fn wait(&mut self, error: &dyn std::fmt::Display) {
        self.retries += 1;
        warn!(
            retry = self.retries,
            max_retries = self.policy.max_retries,
            delay_secs = self.policy.delay.as_secs_f64(),
            error = %error,
            "run failed, retrying"
        );
        sleep(self.policy.delay).await;
    }
}
