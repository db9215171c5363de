//! Exponential backoff for orchestrator calls
//!
//! Transport and server errors are retried; a 4xx answer means the request
//! itself was refused and is returned at once.

use anyhow::{Result, anyhow};
use gantry_client::ClientError;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
}

impl Backoff {
    pub const fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
        }
    }

    /// 10 attempts, 500 ms doubling up to 30 s
    pub const fn standard() -> Self {
        Self::new(10, Duration::from_millis(500), Duration::from_secs(30))
    }

    /// Delays slept between consecutive attempts
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let max_delay = self.max_delay;
        std::iter::successors(Some(self.initial_delay.min(max_delay)), move |delay| {
            Some((*delay * 2).min(max_delay))
        })
        .take(self.max_attempts.saturating_sub(1) as usize)
    }

    /// Runs `call` until it succeeds, is refused or attempts run out
    pub async fn retry<T, F, Fut>(&self, what: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let mut delays = self.delays();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let e = match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_client_error() => {
                    return Err(anyhow!("{} rejected: {}", what, e));
                }
                Err(e) => e,
            };

            let Some(delay) = delays.next() else {
                error!("{} failed after {} attempts", what, attempt);
                return Err(anyhow!("{} failed: {}", what, e));
            };

            warn!(
                "{} failed (attempt {}/{}): {}",
                what, attempt, self.max_attempts, e
            );
            warn!("Retrying in {} ms...", delay.as_millis());

            tokio::time::sleep(delay).await;
        }
    }
}
