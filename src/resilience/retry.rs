use anyhow::Result;
use tokio::time::{sleep, Duration};
use tracing::{error, warn};

use crate::config::settings::RetryConfig;

#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 1000,
        }
    }
}

impl RetrySettings {
    pub fn from_config(retry: Option<&RetryConfig>) -> Self {
        let defaults = Self::default();
        Self {
            attempts: retry.and_then(|r| r.attempts).unwrap_or(defaults.attempts).max(1),
            base_delay_ms: retry.and_then(|r| r.base_delay_ms).unwrap_or(defaults.base_delay_ms),
            max_delay_ms: retry.and_then(|r| r.max_delay_ms).unwrap_or(defaults.max_delay_ms),
        }
    }

    pub async fn run_with_retry<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        self.run_with_retry_if(operation, |_| true).await
    }

    /// Like [`Self::run_with_retry`], but errors `retryable` rejects end the loop at once.
    pub async fn run_with_retry_if<F, Fut, T, P>(&self, mut operation: F, retryable: P) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
        P: Fn(&anyhow::Error) -> bool,
    {
        let mut delay = self.base_delay_ms;
        let attempts = self.attempts.max(1);

        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if !retryable(&e) => {
                    error!("attempt {attempt} failed permanently: {e:#}");
                    return Err(e);
                }
                Err(e) if attempt < attempts => {
                    warn!("Attempt {attempt}/{} failed: {e:#}", attempts);
                    sleep(Duration::from_millis(delay)).await;
                    delay = (delay * 2).min(self.max_delay_ms);
                    attempt += 1;
                }
                Err(e) => {
                    error!("all {attempt} attempts failed: {e:#}");
                    return Err(e);
                }
            }
        }
    }
}
