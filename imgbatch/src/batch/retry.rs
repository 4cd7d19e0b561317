use std::num::NonZeroU8;
use std::time::Duration;

use bytes::Bytes;

use super::*;
use crate::download::Fetcher;

/// Default number of attempts per task.
pub const DEFAULT_MAX_ATTEMPTS: NonZeroU8 = match NonZeroU8::new(3) {
    Some(attempts) => attempts,
    None => unreachable!(),
};

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Outcome of a single fetch attempt.
#[derive(Debug)]
pub enum AttemptOutcome {
    Success(Bytes),
    Failure { reason: FetchError, attempt: u8 },
}

impl AttemptOutcome {
    fn new(result: Result<Bytes, FetchError>, attempt: u8) -> Self {
        match result {
            Ok(bytes) => Self::Success(bytes),
            Err(reason) => Self::Failure { reason, attempt },
        }
    }
}

/// Task state along its attempts.
///
/// ```text
/// Pending -> InFlight(1) -> Failed(1) -> InFlight(2) -> ... -> Succeeded(k) | Failed(max)
/// ```
///
/// `Failed(n)` is terminal only once `n` reaches the maximum number of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    InFlight { attempt: u8 },
    Failed { attempt: u8 },
    Succeeded { attempt: u8 },
}

impl TaskState {
    #[inline]
    pub fn is_terminal(&self, max_attempts: NonZeroU8) -> bool {
        match *self {
            Self::Succeeded { .. } => true,
            Self::Failed { attempt } => attempt >= max_attempts.get(),
            _ => false,
        }
    }
}

/// Fixed-count retry policy around a [`Fetcher`].
///
/// Only network failures are retried, a storage failure is final right away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: NonZeroU8,
    /// Delay before the second attempt, doubled for each following one. No delay when zero.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: NonZeroU8) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    #[inline]
    pub fn with_backoff(self, backoff: Duration) -> Self {
        Self { backoff, ..self }
    }

    /// Delay to wait for after the failed attempt `attempt`.
    fn delay(&self, attempt: u8) -> Duration {
        let factor = 1u32.checked_shl(u32::from(attempt.saturating_sub(1))).unwrap_or(u32::MAX);
        self.backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }

    /// Drive `task` to a terminal state, persisting its payload on the first successful fetch.
    ///
    /// The final error of a failed task is logged here, once.
    pub async fn attempt<F: Fetcher>(&self, fetcher: &F, task: DownloadTask) -> TaskResult {
        let mut state = TaskState::Pending;
        let mut last_error = None;

        loop {
            state = match state {
                TaskState::Pending => TaskState::InFlight { attempt: 1 },
                TaskState::InFlight { attempt } => match AttemptOutcome::new(fetcher.fetch(task.url()).await, attempt) {
                    AttemptOutcome::Success(bytes) => {
                        if let Err(err) = persist::save(&bytes, task.destination()).await {
                            tracing::warn!(
                                "Download failed: {} | cannot write `{}`: {err}",
                                task.url(),
                                task.destination().display()
                            );

                            return TaskResult::failure(task.url().as_str(), attempt, TaskError::Storage(err));
                        }

                        TaskState::Succeeded { attempt }
                    }
                    AttemptOutcome::Failure { reason, attempt } => {
                        tracing::debug!("Attempt {attempt}/{} failed: {} | {reason}", self.max_attempts, task.url());

                        last_error = Some(reason);
                        TaskState::Failed { attempt }
                    }
                },
                TaskState::Succeeded { attempt } => {
                    tracing::trace!("Downloaded {} to `{}`", task.url(), task.destination().display());

                    return TaskResult::success(task.url().as_str(), attempt);
                }
                TaskState::Failed { attempt } if state.is_terminal(self.max_attempts) => {
                    // a failed state is always preceded by a failed attempt
                    let Some(err) = last_error else { unreachable!() };

                    tracing::warn!("Download failed: {} | {err}", task.url());

                    return TaskResult::failure(task.url().as_str(), attempt, TaskError::Fetch(err));
                }
                TaskState::Failed { attempt } => {
                    let delay = self.delay(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }

                    TaskState::InFlight { attempt: attempt + 1 }
                }
            };
        }
    }
}
