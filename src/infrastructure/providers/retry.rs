//! Retry wrapper with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use tokio_retry::Retry;
use tokio_retry::strategy::ExponentialBackoff;

/// Retry schedule applied around every adapter call.
///
/// Delays grow as `base_delay * 2^n`, capped at `max_delay`, with +/-50%
/// jitter. `max_attempts` counts the first call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(200))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: Duration::from_secs(2),
        }
    }

    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delays between attempts, one fewer than `max_attempts`.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        // from_millis(2) yields 2, 4, 8..., so the factor halves the base.
        let factor = (self.base_delay.as_millis() as u64).div_ceil(2);
        ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(self.max_delay)
            .map(jitter)
            .take(self.max_attempts - 1)
    }

    /// Runs `action` until it returns `Ok` or the attempts are used up.
    ///
    /// Only return `Err` for conditions worth retrying; the last `Err` is
    /// returned once the schedule is exhausted.
    pub async fn run<A, Fut, T, E>(&self, action: A) -> Result<T, E>
    where
        A: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        Retry::spawn(self.delays(), action).await
    }
}

fn jitter(delay: Duration) -> Duration {
    if delay.is_zero() {
        return delay;
    }
    delay.mul_f64(rand::random_range(0.5..1.5))
}
