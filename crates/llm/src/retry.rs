//! Escalating-timeout retries for generation calls.
//!
//! Each attempt runs under the next timeout of the schedule. The schedule is
//! finite, so the loop always terminates.

use std::future::Future;
use std::time::Duration;

use ragline_core::{AppError, AppResult};

/// Timeout schedule; its length is the maximum number of attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    timeouts: Vec<Duration>,
}

impl RetryPolicy {
    pub fn new(timeouts: Vec<Duration>) -> Self {
        Self { timeouts }
    }

    pub fn from_secs(secs: &[u64]) -> Self {
        Self::new(secs.iter().map(|s| Duration::from_secs(*s)).collect())
    }

    pub fn max_attempts(&self) -> usize {
        self.timeouts.len()
    }

    /// Timeout of the first attempt, if the schedule is non-empty.
    pub fn first(&self) -> Option<Duration> {
        self.timeouts.first().copied()
    }

    fn timeout_for(&self, attempt: usize) -> Option<Duration> {
        self.timeouts.get(attempt).copied()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_secs(&[60, 120, 240])
    }
}

/// Outcome of one attempt.
#[derive(Debug)]
pub enum RetryState<T> {
    /// Run attempt number `attempt` (zero-based) under `timeout`.
    Attempt { attempt: usize, timeout: Duration },
    Success(T),
    /// The attempt failed with a retryable error and the schedule has more entries.
    Retry {
        next_attempt: usize,
        next_timeout: Duration,
        error: AppError,
    },
    /// The schedule ran out, or the error is not worth retrying.
    Exhausted { attempts: usize, error: AppError },
}

impl<T> RetryState<T> {
    /// Classify the result of `attempt` against the policy.
    pub fn after(policy: &RetryPolicy, attempt: usize, result: AppResult<T>) -> Self {
        match result {
            Ok(value) => RetryState::Success(value),
            Err(error) if !is_retryable(&error) => RetryState::Exhausted {
                attempts: attempt + 1,
                error,
            },
            Err(error) => match policy.timeout_for(attempt + 1) {
                Some(next_timeout) => RetryState::Retry {
                    next_attempt: attempt + 1,
                    next_timeout,
                    error,
                },
                None => RetryState::Exhausted {
                    attempts: attempt + 1,
                    error,
                },
            },
        }
    }
}

/// Errors that a new attempt cannot fix.
pub fn is_retryable(error: &AppError) -> bool {
    !matches!(
        error,
        AppError::ModelNotFound { .. } | AppError::Config(_) | AppError::Prompt(_)
    )
}

/// Run `op` under the policy, passing each attempt its timeout.
///
/// Non-retryable errors are returned unchanged. Exhausting the schedule on
/// retryable errors yields [`AppError::GenerationFailed`].
pub async fn run_with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> AppResult<T>
where
    F: FnMut(Duration) -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut state = match policy.first() {
        Some(timeout) => RetryState::Attempt {
            attempt: 0,
            timeout,
        },
        None => {
            return Err(AppError::GenerationFailed {
                attempts: 0,
                last_error: "retry schedule is empty".to_string(),
            })
        }
    };

    loop {
        state = match state {
            RetryState::Attempt { attempt, timeout } => {
                tracing::debug!(
                    "{}: attempt {}/{} with timeout {:?}",
                    label,
                    attempt + 1,
                    policy.max_attempts(),
                    timeout
                );
                let result = op(timeout).await;
                RetryState::after(policy, attempt, result)
            }
            RetryState::Success(value) => return Ok(value),
            RetryState::Retry {
                next_attempt,
                next_timeout,
                error,
            } => {
                tracing::warn!("{}: attempt {} failed: {}", label, next_attempt, error);
                RetryState::Attempt {
                    attempt: next_attempt,
                    timeout: next_timeout,
                }
            }
            RetryState::Exhausted { attempts, error } => {
                if !is_retryable(&error) {
                    return Err(error);
                }
                tracing::error!("{}: giving up after {} attempt(s)", label, attempts);
                return Err(AppError::GenerationFailed {
                    attempts,
                    last_error: error.to_string(),
                });
            }
        };
    }
}
