//! # Retry Policy
//!
//! Bounded-duration retry executor for remote operations blocked on a
//! transient dependency (access-policy propagation, a recorder that has not
//! stopped yet).
//!
//! The executor only owns the bounded phase: it re-runs the operation with
//! Fibonacci backoff while a classifier reports the error as retryable and
//! the deadline has not passed, then hands the last error back as
//! [`RetryOutcome::Exhausted`]. The caller decides what an exhausted window
//! means - the reconciler makes exactly one more unretried attempt so an
//! operation that would have succeeded just past the boundary is not
//! penalized by the timeout.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::constants::{RETRY_BACKOFF_MAX_SECS, RETRY_BACKOFF_MIN_SECS};
use crate::controller::backoff::FibonacciBackoff;
use crate::provider::RemoteError;

/// Outcome of running an operation under a [`RetryPolicy`].
#[derive(Debug)]
pub enum RetryOutcome<T> {
    /// The operation succeeded within the retry window.
    Ok(T),
    /// The operation failed with an error the classifier deemed terminal.
    Terminal(RemoteError),
    /// The window elapsed while the operation kept failing retryably.
    /// Carries the last retryable error observed.
    Exhausted(RemoteError),
}

/// Bounded-duration retry executor.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    timeout: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run `operation` until it succeeds, fails terminally, or the window
    /// elapses.
    ///
    /// The first attempt runs immediately. Sleeps between attempts follow
    /// the Fibonacci sequence, clamped so the final in-window attempt lands
    /// on the deadline rather than past it.
    pub async fn run<T, F, Fut, P>(&self, mut operation: F, is_retryable: P) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
        P: Fn(&RemoteError) -> bool,
    {
        let deadline = Instant::now() + self.timeout;
        let mut backoff = FibonacciBackoff::new(RETRY_BACKOFF_MIN_SECS, RETRY_BACKOFF_MAX_SECS);

        loop {
            let error = match operation().await {
                Ok(value) => return RetryOutcome::Ok(value),
                Err(error) => error,
            };

            if !is_retryable(&error) {
                return RetryOutcome::Terminal(error);
            }

            let now = Instant::now();
            if now >= deadline {
                return RetryOutcome::Exhausted(error);
            }

            let wait = backoff.next_backoff().min(deadline - now);
            debug!(
                "retryable error ({error}), next attempt in {}s",
                wait.as_secs()
            );
            sleep(wait).await;
        }
    }
}
