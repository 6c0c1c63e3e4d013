//! Centralized retry policy for external calls
//!
//! One policy object, consulted by the orchestrator before any provider
//! call, decides which error kinds are retryable and how long to back
//! off. Provider rate-limit rejections are never retried: hammering a
//! limited API only extends the penalty window.

use crate::config::RetryConfig;
use crate::errors::{BrokerError, Result};
use rand::Rng;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

/// Retry policy with exponential backoff and jitter
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Whether a failed attempt should be retried
    pub fn should_retry(&self, error: &BrokerError, attempt: u32) -> bool {
        attempt < self.config.max_attempts && error.is_retryable()
    }

    /// Backoff delay before the given attempt (1-based), doubled each time
    /// with up to 25% random jitter
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        let base = self
            .config
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.config.max_delay_ms);
        let jitter = rand::thread_rng().gen_range(0..=base / 4 + 1);
        Duration::from_millis(base + jitter)
    }

    /// Run an external call under this policy
    pub async fn run<F, Fut>(&self, mut call: F) -> Result<Value>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        let mut attempt = 1u32;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if self.should_retry(&err, attempt) => {
                    tokio::time::sleep(self.delay_for(attempt)).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            max_attempts,
            base_delay_ms: 1,
            max_delay_ms: 4,
        })
    }

    #[test]
    fn test_rate_limit_never_retried() {
        let policy = policy(3);
        let err = BrokerError::ProviderRateLimited("429".to_string());
        assert!(!policy.should_retry(&err, 1));
    }

    #[test]
    fn test_unavailable_retried_within_budget() {
        let policy = policy(2);
        let err = BrokerError::ProviderUnavailable("connection reset".to_string());
        assert!(policy.should_retry(&err, 1));
        assert!(!policy.should_retry(&err, 2));
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 5,
            base_delay_ms: 100,
            max_delay_ms: 300,
        });
        assert!(policy.delay_for(1) >= Duration::from_millis(100));
        assert!(policy.delay_for(2) >= Duration::from_millis(200));
        // Capped at max plus jitter headroom
        assert!(policy.delay_for(4) <= Duration::from_millis(300 + 76));
    }

    #[tokio::test]
    async fn test_run_retries_once_then_succeeds() {
        let policy = policy(2);
        let attempts = AtomicU32::new(0);

        let result = policy
            .run(|| {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(BrokerError::ProviderUnavailable("flaky".to_string()))
                    } else {
                        Ok(json!({"ok": true}))
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_run_gives_up_after_max_attempts() {
        let policy = policy(2);
        let attempts = AtomicU32::new(0);

        let result = policy
            .run(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(BrokerError::ProviderUnavailable("down".to_string())) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_run_does_not_retry_invalid_input() {
        let policy = policy(3);
        let attempts = AtomicU32::new(0);

        let result = policy
            .run(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(BrokerError::InvalidInput("bad".to_string())) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
