//! Bounded retry around an [`LLMProvider`]
//!
//! Only failures classified as transient are retried, with exponential
//! backoff capped at a ceiling. Anything else is returned at once.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::agent::provider::LLMProvider;
use crate::config::ProviderConfig;
use crate::error::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ProviderConfig::default())
    }
}

/// True for timeouts, connection failures, HTTP 429 and 5xx.
pub fn is_transient(err: &anyhow::Error) -> bool {
    if let Some(e) = err.downcast_ref::<ProviderError>() {
        return matches!(e, ProviderError::Transient(_));
    }
    if let Some(e) = err.downcast_ref::<reqwest::Error>() {
        return e.is_timeout()
            || e.is_connect()
            || e.status().map_or(false, |s| s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error());
    }
    err.downcast_ref::<tokio::time::error::Elapsed>().is_some()
}

pub struct RetryingProvider {
    inner: Arc<dyn LLMProvider>,
    policy: RetryPolicy,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn LLMProvider>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl LLMProvider for RetryingProvider {
    async fn generate(&self, model: &str, prompt: String, system: Option<String>) -> Result<String> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.inner.generate(model, prompt.clone(), system.clone()).await {
                Ok(text) => {
                    if attempt > 1 {
                        debug!("Provider succeeded on attempt {}", attempt);
                    }
                    return Ok(text);
                }
                Err(e) if !is_transient(&e) => return Err(e),
                Err(e) if attempt >= self.policy.max_attempts => {
                    warn!("Provider gave up after {} attempts: {}", attempt, e);
                    return Err(ProviderError::Exhausted {
                        attempts: attempt,
                        last: e.to_string(),
                    }
                    .into());
                }
                Err(e) => {
                    let delay = self.policy.delay(attempt);
                    warn!("Transient provider failure ({}), retrying in {:?}", e, delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
