//! Failure-tolerant async building blocks shared by the orchestrator and the
//! crawl-and-poll loop.

use futures::future::join_all;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::PollError;

/// Runs every future concurrently and waits for all of them to finish.
/// The output preserves input order; one failure never short-circuits the rest.
pub async fn settle_all<I, F, T, E>(futures: I) -> Vec<Result<T, E>>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>>,
{
    join_all(futures).await
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub deadline: Duration,
    pub max_consecutive_errors: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, deadline: Duration, max_consecutive_errors: u32) -> Self {
        Self {
            interval,
            deadline,
            max_consecutive_errors: max_consecutive_errors.max(1),
        }
    }
}

/// What one poll attempt saw.
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus<T> {
    Ready(T),
    /// Not done yet; may carry the partial result gathered so far.
    Pending(Option<T>),
}

/// Calls `op` every `interval` until it reports `Ready`, the wall-clock
/// `deadline` passes, or `max_consecutive_errors` attempts in a row fail.
/// A successful attempt resets the error streak. When less than one interval
/// is left, the loop waits out the deadline and polls once more, giving that
/// last attempt at most one interval to answer.
pub async fn poll_bounded<T, E, F, Fut>(policy: PollPolicy, mut op: F) -> Result<T, PollError<T, E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollStatus<T>, E>>,
    E: std::fmt::Display,
{
    let started = Instant::now();
    let deadline = started + policy.deadline;
    let mut attempts = 0u32;
    let mut consecutive_errors = 0u32;
    let mut partial: Option<T> = None;
    let mut last_call = false;

    loop {
        attempts += 1;
        let cutoff = if last_call {
            Instant::now() + policy.interval
        } else {
            deadline
        };
        match tokio::time::timeout_at(cutoff, op()).await {
            Err(_) => {
                return Err(PollError::TimedOut {
                    elapsed: started.elapsed(),
                    attempts,
                    partial,
                });
            }
            Ok(Ok(PollStatus::Ready(value))) => return Ok(value),
            Ok(Ok(PollStatus::Pending(progress))) => {
                consecutive_errors = 0;
                if progress.is_some() {
                    partial = progress;
                }
            }
            Ok(Err(e)) => {
                consecutive_errors += 1;
                log::warn!(
                    "poll attempt {attempts} failed ({consecutive_errors}/{} in a row): {e}",
                    policy.max_consecutive_errors
                );
                if consecutive_errors >= policy.max_consecutive_errors {
                    return Err(PollError::TooManyErrors {
                        consecutive: consecutive_errors,
                        last_error: e,
                        partial,
                    });
                }
            }
        }

        if last_call {
            return Err(PollError::TimedOut {
                elapsed: started.elapsed(),
                attempts,
                partial,
            });
        }
        if Instant::now() + policy.interval >= deadline {
            tokio::time::sleep_until(deadline).await;
            last_call = true;
        } else {
            tokio::time::sleep(policy.interval).await;
        }
    }
}
