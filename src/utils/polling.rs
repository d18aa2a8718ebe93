/// Waiting on cluster conditions with a deadline
use anyhow::Result;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Returned when a condition never became true before the deadline
#[derive(Debug, thiserror::Error)]
#[error("timed out after {}s waiting for {what}", .waited.as_secs())]
pub struct PollTimeout {
    pub what: String,
    pub waited: Duration,
}

/// Repeatedly checks a condition until it holds or the timeout expires
pub struct Poller {
    timeout: Duration,
    interval: Duration,
    what: String,
}

impl Poller {
    pub fn new(timeout: Duration, interval: Duration, what: impl Into<String>) -> Self {
        Self {
            timeout,
            interval,
            what: what.into(),
        }
    }

    /// Resolve once `check` returns `Ok(true)`.
    ///
    /// A check error ends the wait immediately. `Ok(false)` sleeps one interval and retries.
    pub async fn until<F, Fut>(&self, check: F) -> Result<()>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        info!("Waiting for {}...", self.what);
        let start = Instant::now();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            if check().await? {
                info!("✓ {}", self.what);
                return Ok(());
            }
            debug!("{} not ready (attempt {})", self.what, attempt);

            if start.elapsed() >= self.timeout {
                return Err(PollTimeout {
                    what: self.what.clone(),
                    waited: start.elapsed(),
                }
                .into());
            }

            tokio::time::sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_until_becomes_ready() {
        let calls = Arc::new(AtomicU32::new(0));
        let poller = Poller::new(Duration::from_secs(5), Duration::from_millis(10), "driver pods");

        let result = poller
            .until(|| {
                let calls = calls.clone();
                async move { Ok(calls.fetch_add(1, Ordering::SeqCst) >= 2) }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_until_times_out() {
        let poller = Poller::new(Duration::from_millis(50), Duration::from_millis(10), "never");

        let err = poller.until(|| async { Ok(false) }).await.unwrap_err();

        assert!(err.downcast_ref::<PollTimeout>().is_some());
        assert!(err.to_string().contains("waiting for never"));
    }

    #[tokio::test]
    async fn test_until_stops_on_error() {
        let poller = Poller::new(Duration::from_secs(5), Duration::from_millis(10), "broken");

        let err = poller
            .until(|| async { Err(anyhow::anyhow!("kubectl exploded")) })
            .await
            .unwrap_err();

        assert!(err.to_string().contains("kubectl exploded"));
    }
}
