use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tracing::warn;

/// Fixed-backoff retry policy for a single source call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts = max_retries + 1.
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_millis(2000))
    }
}

/// Run `op` until it succeeds or the policy is exhausted. Returns the last
/// error when every attempt failed.
pub async fn with_retries<T, F, Fut>(label: &str, policy: RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                warn!(label, attempt, error = %e, "Attempt failed");
                if attempt > policy.max_retries {
                    return Err(e);
                }
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}
