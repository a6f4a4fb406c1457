//! Waiters and retry with exponential backoff
//!
//! A waiter polls a resource's state at a fixed interval until it is ready,
//! has failed, or the timeout elapses. `retry` re-runs a fallible call with
//! exponential backoff.

use crate::error::{CloudError, Result};
use crate::model::ResourceState;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Polling interval and upper bound for a waiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl WaitConfig {
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            timeout: Duration::from_secs(600),
        }
    }
}

/// Poll `probe` until it reports [`ResourceState::Available`]
///
/// Returns `CloudError::Timeout` once `config.timeout` has elapsed, and
/// `CloudError::Api` if the resource reaches a failed state. Errors from
/// the probe itself are propagated immediately.
pub async fn wait_until<F, Fut>(what: &str, config: WaitConfig, mut probe: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ResourceState>>,
{
    let deadline = Instant::now() + config.timeout;
    loop {
        match probe().await? {
            ResourceState::Available => {
                tracing::debug!(resource = what, "resource is ready");
                return Ok(());
            }
            ResourceState::Failed(reason) => {
                return Err(CloudError::api(format!("waiting for {}", what), reason));
            }
            ResourceState::Pending => {}
        }

        if Instant::now() + config.interval >= deadline {
            return Err(CloudError::Timeout(format!(
                "{} not ready after {}s",
                what,
                config.timeout.as_secs()
            )));
        }
        sleep(config.interval).await;
    }
}

/// Retry policy for calls that fail transiently
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,

    /// Delay before the second attempt
    pub initial_delay: Duration,

    /// Upper bound on any single delay
    pub max_delay: Duration,

    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay to sleep after the given (zero-based) failed attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt as i32);
        let delay = self.initial_delay.as_secs_f64() * factor;
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }
}

/// Run `op` until it succeeds or `config.max_attempts` is exhausted
///
/// The last error is returned when every attempt fails.
pub async fn retry<T, F, Fut>(what: &str, config: &RetryConfig, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = config.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 < attempts => {
                let delay = config.delay_for_attempt(attempt);
                tracing::debug!(
                    operation = what,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "retrying"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
