use std::future::Future;
use std::time::Duration;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_MULTIPLIER: f64 = 2.0;
const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(100);

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    multiplier: f64,
    max_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, DEFAULT_INITIAL_DELAY, DEFAULT_MULTIPLIER, None)
    }
}

impl RetryPolicy {
    /// Out-of-range values are replaced with defaults: zero attempts becomes 3,
    /// a multiplier of 1 or less (or non-finite) becomes 2, a zero delay becomes 100ms.
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        multiplier: f64,
        max_delay: Option<Duration>,
    ) -> Self {
        Self {
            max_attempts: if max_attempts == 0 { DEFAULT_MAX_ATTEMPTS } else { max_attempts },
            initial_delay: if initial_delay.is_zero() { DEFAULT_INITIAL_DELAY } else { initial_delay },
            multiplier: if multiplier > 1.0 && multiplier.is_finite() { multiplier } else { DEFAULT_MULTIPLIER },
            max_delay: max_delay.filter(|d| !d.is_zero()),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay slept after the given failed attempt (1-based). Growth that
    /// overflows `Duration` saturates at `max_delay`, or `Duration::MAX`
    /// without a cap.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let ceiling = self.max_delay.unwrap_or(Duration::MAX);
        let seconds = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);

        Duration::try_from_secs_f64(seconds).map_or(ceiling, |delay| delay.min(ceiling))
    }

    /// Run `op` until it succeeds, returns an error rejected by
    /// `is_retryable`, or the attempt budget is spent. The last error is
    /// returned on exhaustion.
    pub async fn run<F, Fut, T, E, R>(&self, mut op: F, is_retryable: R) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= self.max_attempts || !is_retryable(&err) => return Err(err),
                Err(_) => {
                    let delay = self.delay_for(attempt);
                    tracing::debug!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = %delay.as_millis(),
                        "Operation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
