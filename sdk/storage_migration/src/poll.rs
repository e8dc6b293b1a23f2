use std::{future::Future, time::Duration};
use tokio::time::Instant;

/// Exponential backoff bounded by a total time budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub timeout: Duration,
}

impl PollOptions {
    pub fn new(initial_delay: Duration, max_delay: Duration, timeout: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
            timeout,
        }
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Delay before attempt `attempt + 1`, counting from zero.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// What a single poll attempt observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll<T> {
    Ready(T),
    Pending(T),
}

/// Outcome of [`poll_until`]: the last observed value and whether it was ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polled<T> {
    pub value: T,
    pub ready: bool,
    pub attempts: u32,
}

/// Calls `check` until it reports [`Poll::Ready`] or the timeout would be
/// exceeded by the next delay. Errors from `check` end the poll immediately.
pub async fn poll_until<T, F, Fut>(options: PollOptions, mut check: F) -> azure_core::Result<Polled<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = azure_core::Result<Poll<T>>>,
{
    let started = Instant::now();
    let mut attempt = 0;
    loop {
        let observed = check().await?;
        attempt += 1;
        let value = match observed {
            Poll::Ready(value) => {
                return Ok(Polled {
                    value,
                    ready: true,
                    attempts: attempt,
                })
            }
            Poll::Pending(value) => value,
        };

        let delay = options.delay(attempt - 1);
        if started.elapsed() + delay > options.timeout {
            return Ok(Polled {
                value,
                ready: false,
                attempts: attempt,
            });
        }
        log::debug!("not ready after attempt {attempt}, sleeping {delay:?}");
        tokio::time::sleep(delay).await;
    }
}
