//! Bounded retry with a fixed delay between attempts.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use log::{ error, info, warn };
use tokio::time::sleep;

pub const MAX_RETRIES: u32 = 2;
pub const RETRY_DELAY: Duration = Duration::from_millis(2000);

/// How often and how long to wait before re-sending a failed turn.
/// The delay does not grow between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            delay: RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Runs `operation` until it succeeds, fails with an error `is_retryable`
    /// rejects, or `max_retries` retries have been spent.
    ///
    /// `operation` receives the 1-based attempt number. `on_retry` is called
    /// with the retry number (1..=max_retries) before each wait.
    pub async fn execute<T, E, F, Fut, R, N>(
        &self,
        mut operation: F,
        is_retryable: R,
        mut on_retry: N
    ) -> Result<T, E>
        where
            F: FnMut(u32) -> Fut,
            Fut: Future<Output = Result<T, E>>,
            R: Fn(&E) -> bool,
            N: FnMut(u32, &E),
            E: Display
    {
        let mut retries = 0;

        loop {
            match operation(retries + 1).await {
                Ok(result) => {
                    if retries > 0 {
                        info!("Operation succeeded after {} retry attempts", retries);
                    }
                    return Ok(result);
                }
                Err(e) if is_retryable(&e) && retries < self.max_retries => {
                    retries += 1;
                    warn!(
                        "Retryable error encountered (attempt {}/{}): {}. Waiting {:?} before retry.",
                        retries,
                        self.max_retries,
                        e,
                        self.delay
                    );
                    on_retry(retries, &e);
                    sleep(self.delay).await;
                }
                Err(e) => {
                    if retries > 0 {
                        error!("Operation failed after {} retry attempts: {}", retries, e);
                    }
                    return Err(e);
                }
            }
        }
    }
}
