use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same pause before every retry.
    Fixed(Duration),
    /// Pause grows with the attempt number: `step`, `2 * step`, `3 * step`, ...
    Linear(Duration),
}

impl Backoff {
    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay(&self, attempt: usize) -> Duration {
        match self {
            Backoff::Fixed(d) => *d,
            Backoff::Linear(step) => step.saturating_mul(attempt as u32),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total runs, including the first one. Zero behaves like one.
    pub max_attempts: usize,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed(delay),
        }
    }

    pub fn linear(max_attempts: usize, step: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Linear(step),
        }
    }
}

/// Retries an async operation while `is_retryable` accepts its error
///
/// # Parameters
/// - `policy`: Attempt bound and delay schedule
/// - `is_retryable`: Decides whether a failure is worth another attempt
/// - `operation`: Closure returning a future
///
/// # Returns
/// Either the successful result, the first non-retryable error, or the error of the last attempt
pub async fn with_retry<F, Fut, T, E>(
    policy: &RetryPolicy,
    is_retryable: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt >= max_attempts || !is_retryable(&err) {
                    return Err(err);
                }
                let delay = policy.backoff.delay(attempt);
                debug!(
                    "Attempt {}/{} failed: {}. Retrying in {:?}...",
                    attempt, max_attempts, err, delay
                );
                attempt += 1;
                tokio::time::sleep(delay).await;
            }
        }
    }
}
