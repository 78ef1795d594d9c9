//! Retry configuration, delay calculation, and the retry decorator.
//!
//! Provides [`RetryConfig`] for controlling retry behaviour and the
//! [`Retrying`] decorator that retries transient errors of the wrapped
//! completer or embedder.
//!
//! Both impls delegate to the shared `with_retry()` helper, keeping retry
//! logic in a single place.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::telemetry;

use super::traits::{Completer, Embedder};
use crate::types::{CompleteOptions, Completion, Embedding, Message};
use crate::{Result, SwitchyardError};

/// Configuration for retry behaviour on transient errors.
///
/// Uses exponential backoff. Deserializes from the `retry` table of a
/// provider entry; absent fields keep their defaults.
///
/// ```rust
/// # use switchyard::providers::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_attempts(5)
///     .initial_delay(Duration::from_millis(200));
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial call).
    /// 1 = no retry. Default: 3.
    pub max_attempts: u32,
    /// Base delay before the first retry. Default: 500ms.
    #[serde(with = "millis", rename = "initial_delay_ms")]
    pub initial_delay: Duration,
    /// Maximum delay between retries (caps exponential growth). Default: 30s.
    #[serde(with = "millis", rename = "max_delay_ms")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// A config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay for a given attempt number (0-indexed).
    ///
    /// Exponential backoff: `initial_delay * 2^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }

    /// Delay before the next attempt; a vendor `retry_after` hint wins.
    pub fn effective_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or_else(|| self.delay_for_attempt(attempt))
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

// ============================================================================
// Shared retry helper
// ============================================================================

/// Execute an async operation with retry logic.
///
/// Retries errors accepted by `retryable` up to `config.max_attempts`, using
/// exponential backoff and respecting `retry_after` hints from
/// `RateLimited` errors. Other errors are returned immediately. A cancelled
/// `cancel` token interrupts the backoff sleep.
pub(crate) async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    provider_name: &str,
    operation: &str,
    cancel: &CancellationToken,
    retryable: impl Fn(&SwitchyardError) -> bool,
    f: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        let e = match f().await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };
        if attempt + 1 >= max_attempts || !retryable(&e) {
            return Err(e);
        }

        metrics::counter!(telemetry::RETRIES_TOTAL,
            "provider" => provider_name.to_owned(),
            "operation" => operation.to_owned(),
        )
        .increment(1);

        let delay = config.effective_delay(attempt, e.retry_after());
        warn!(
            provider = provider_name,
            operation,
            attempt = attempt + 1,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %e,
            "retrying after transient error"
        );
        tokio::select! {
            _ = cancel.cancelled() => return Err(SwitchyardError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}

// ============================================================================
// Retrying
// ============================================================================

/// Decorator that retries transient errors of the wrapped provider.
///
/// Errors are classified by [`SwitchyardError::is_transient()`]. A streaming
/// completion is retried only while it has not delivered any delta, so a
/// consumer never sees a fragment twice.
pub struct Retrying<P: ?Sized> {
    inner: Arc<P>,
    config: RetryConfig,
}

impl<P: ?Sized> Retrying<P> {
    pub fn new(inner: Arc<P>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

#[async_trait]
impl<P: Completer + ?Sized> Completer for Retrying<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(&self, messages: &[Message], options: CompleteOptions) -> Result<Completion> {
        let cancel = options.cancel.clone();
        let sink = options.stream.clone();
        let untouched = |e: &SwitchyardError| {
            e.is_transient() && sink.as_ref().is_none_or(|sink| sink.sent() == 0)
        };

        with_retry(
            &self.config,
            self.inner.name(),
            "complete",
            &cancel,
            untouched,
            || self.inner.complete(messages, options.clone()),
        )
        .await
    }
}

#[async_trait]
impl<P: Embedder + ?Sized> Embedder for Retrying<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        with_retry(
            &self.config,
            self.inner.name(),
            "embed",
            &CancellationToken::new(),
            SwitchyardError::is_transient,
            || self.inner.embed(text),
        )
        .await
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        with_retry(
            &self.config,
            self.inner.name(),
            "embed_batch",
            &CancellationToken::new(),
            SwitchyardError::is_transient,
            || self.inner.embed_batch(texts),
        )
        .await
    }
}
