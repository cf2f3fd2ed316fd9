//! Bounded, fixed-delay retry around a fallible async operation.
//!
//! Every failure is retried the same way regardless of its kind. Attempts
//! are 1-indexed; the delay only runs between attempts, never after the last.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Run `operation` under this policy. `label` names it in the logs.
    pub async fn execute<T, E, F, Fut>(&self, label: &str, operation: F) -> Result<T, E>
    where
        E: Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        execute(label, operation, self.max_attempts, self.delay).await
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum RetryOutcome<T, E> {
    Succeeded { value: T, attempts: u32 },
    Exhausted { last_error: E, attempts: u32 },
}

impl<T, E> RetryOutcome<T, E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Succeeded { attempts, .. } | RetryOutcome::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn into_result(self) -> Result<T, E> {
        match self {
            RetryOutcome::Succeeded { value, .. } => Ok(value),
            RetryOutcome::Exhausted { last_error, .. } => Err(last_error),
        }
    }
}

/// Attempts `operation` up to `max_attempts` times (at least once), sleeping
/// `delay` after each failure that still has an attempt left.
pub async fn run<T, E, F, Fut>(
    label: &str,
    mut operation: F,
    max_attempts: u32,
    delay: Duration,
) -> RetryOutcome<T, E>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;

    loop {
        log::debug!("{}: attempt {}/{}", label, attempt, max_attempts);

        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    log::info!("{}: succeeded on attempt {}", label, attempt);
                }
                return RetryOutcome::Succeeded {
                    value,
                    attempts: attempt,
                };
            }
            Err(err) if attempt < max_attempts => {
                log::warn!(
                    "{}: attempt {}/{} failed: {}; retrying in {}ms",
                    label,
                    attempt,
                    max_attempts,
                    err,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                log::error!("{}: giving up after {} attempt(s): {}", label, attempt, err);
                return RetryOutcome::Exhausted {
                    last_error: err,
                    attempts: attempt,
                };
            }
        }
    }
}

/// Like [`run`], but hands back the value or the last error unchanged.
pub async fn execute<T, E, F, Fut>(
    label: &str,
    operation: F,
    max_attempts: u32,
    delay: Duration,
) -> Result<T, E>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    run(label, operation, max_attempts, delay).await.into_result()
}
