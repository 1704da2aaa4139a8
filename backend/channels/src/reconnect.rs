//! Reconnect loop with exponential backoff for long-lived source connections.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Give up after this many consecutive failures. `0` retries forever.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
    /// A connection that stayed up at least this long resets the attempt count.
    pub stable_after: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(60),
            stable_after: Duration::from_secs(120),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = self.backoff_factor.max(1.0).powi(attempt.saturating_sub(1) as i32);
        let delay_ms = (self.base_delay.as_millis() as f64 * factor)
            .min(self.max_delay.as_millis() as f64);
        Duration::from_millis(delay_ms as u64)
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        self.max_attempts == 0 || attempt < self.max_attempts
    }
}

/// Run `connect` until it returns `Ok`, reconnecting after failures.
///
/// Returns the last error once the policy is exhausted.
pub async fn run_with_reconnect<F, Fut>(name: &str, policy: &ReconnectPolicy, mut connect: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut attempt = 0u32;
    loop {
        let started = Instant::now();
        match connect().await {
            Ok(()) => {
                info!(source = name, "Source connection closed");
                return Ok(());
            }
            Err(e) => {
                if started.elapsed() >= policy.stable_after {
                    attempt = 0;
                }
                attempt += 1;
                if !policy.should_retry(attempt) {
                    warn!(source = name, attempt, error = %e, "Giving up on source connection");
                    return Err(e);
                }
                let delay = policy.delay_for(attempt);
                warn!(
                    source = name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Source connection failed, reconnecting"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn policy(max_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts,
            ..ReconnectPolicy::default()
        }
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let p = policy(0);
        assert_eq!(p.delay_for(0), Duration::ZERO);
        assert_eq!(p.delay_for(1), Duration::from_secs(1));
        assert_eq!(p.delay_for(3), Duration::from_secs(4));
        assert_eq!(p.delay_for(20), Duration::from_secs(60));
    }

    #[test]
    fn test_unlimited_policy_always_retries() {
        assert!(policy(0).should_retry(10_000));
        assert!(!policy(3).should_retry(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result = run_with_reconnect("test", &policy(0), move || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    anyhow::bail!("gateway unavailable");
                }
                Ok(())
            }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result = run_with_reconnect("test", &policy(2), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(anyhow::anyhow!("bad token"))
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
