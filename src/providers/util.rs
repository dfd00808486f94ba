use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// How many times, and how far apart, to retry a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: usize,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: usize, delay_ms: u64) -> Self {
        Self {
            retries,
            delay: Duration::from_millis(delay_ms),
        }
    }

    pub fn none() -> Self {
        Self::new(0, 0)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, 300)
    }
}

/// Retries an async request while it fails with a timeout, a connection error or
/// a 5xx status. Other failures are returned immediately.
///
/// Total runs are at most `1 + policy.retries`.
pub async fn with_retry<F, Fut, T>(mut operation: F, policy: RetryPolicy) -> reqwest::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = reqwest::Result<T>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt > policy.retries || !is_retryable(&err) {
                    return Err(err);
                }
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt, policy.retries, err
                );
                attempt += 1;
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}

fn is_retryable(err: &reqwest::Error) -> bool {
    err.is_timeout()
        || err.is_connect()
        || err.status().is_some_and(|status| status.is_server_error())
}
