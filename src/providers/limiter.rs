//! Rate-limit decorator backed by governor.
//!
//! A [`RateLimit`] is a shared token bucket. Every [`Limited`] wrapper
//! holding a clone of it draws from the same bucket, so concurrent calls to
//! one provider queue behind each other instead of overrunning the vendor.

use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::traits::{
    Completer, Embedder, Renderer, Reranker, Synthesizer, Transcriber, Translator,
};
use crate::telemetry;
use crate::types::{
    CompleteOptions, Completion, Embedding, File, Image, Message, Ranking, RenderOptions,
    RerankOptions, Synthesis, SynthesizeOptions, TranscribeOptions, Transcription,
    TranslateOptions, Translation,
};
use crate::{Result, SwitchyardError};

/// A requests-per-second budget, shareable between wrappers.
#[derive(Clone)]
pub struct RateLimit {
    limiter: Arc<DefaultDirectRateLimiter>,
    per_second: u32,
}

impl RateLimit {
    /// Allow `n` requests per second, with bursts of up to `n`.
    pub fn per_second(n: u32) -> Result<Self> {
        let rate = NonZeroU32::new(n).ok_or_else(|| {
            SwitchyardError::Configuration("rate limit must be greater than zero".to_string())
        })?;
        Ok(Self {
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(rate))),
            per_second: n,
        })
    }

    pub fn rate(&self) -> u32 {
        self.per_second
    }

    /// Wait for a permit. Returns `Cancelled` if `cancel` fires first.
    async fn acquire(&self, provider: &str, cancel: &CancellationToken) -> Result<()> {
        if self.limiter.check().is_ok() {
            return Ok(());
        }

        debug!(provider, rate = self.per_second, "waiting for rate-limit permit");
        metrics::counter!(telemetry::RATE_LIMIT_WAITS_TOTAL,
            "provider" => provider.to_owned(),
        )
        .increment(1);

        tokio::select! {
            _ = cancel.cancelled() => Err(SwitchyardError::Cancelled),
            _ = self.limiter.until_ready() => Ok(()),
        }
    }
}

impl std::fmt::Debug for RateLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimit")
            .field("per_second", &self.per_second)
            .finish()
    }
}

/// Decorator that waits for a [`RateLimit`] permit before each call.
pub struct Limited<P: ?Sized> {
    inner: Arc<P>,
    limit: RateLimit,
}

impl<P: ?Sized> Limited<P> {
    pub fn new(inner: Arc<P>, limit: RateLimit) -> Self {
        Self { inner, limit }
    }

    pub fn limit(&self) -> &RateLimit {
        &self.limit
    }
}

#[async_trait]
impl<P: Completer + ?Sized> Completer for Limited<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(&self, messages: &[Message], options: CompleteOptions) -> Result<Completion> {
        self.limit.acquire(self.inner.name(), &options.cancel).await?;
        self.inner.complete(messages, options).await
    }
}

#[async_trait]
impl<P: Embedder + ?Sized> Embedder for Limited<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.limit
            .acquire(self.inner.name(), &CancellationToken::new())
            .await?;
        self.inner.embed(text).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        self.limit
            .acquire(self.inner.name(), &CancellationToken::new())
            .await?;
        self.inner.embed_batch(texts).await
    }
}

#[async_trait]
impl<P: Reranker + ?Sized> Reranker for Limited<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn rerank(
        &self,
        query: &str,
        texts: &[&str],
        options: &RerankOptions,
    ) -> Result<Vec<Ranking>> {
        self.limit
            .acquire(self.inner.name(), &CancellationToken::new())
            .await?;
        self.inner.rerank(query, texts, options).await
    }
}

#[async_trait]
impl<P: Synthesizer + ?Sized> Synthesizer for Limited<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn synthesize(&self, text: &str, options: &SynthesizeOptions) -> Result<Synthesis> {
        self.limit
            .acquire(self.inner.name(), &CancellationToken::new())
            .await?;
        self.inner.synthesize(text, options).await
    }
}

#[async_trait]
impl<P: Transcriber + ?Sized> Transcriber for Limited<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn transcribe(
        &self,
        input: &File,
        options: &TranscribeOptions,
    ) -> Result<Transcription> {
        self.limit
            .acquire(self.inner.name(), &CancellationToken::new())
            .await?;
        self.inner.transcribe(input, options).await
    }
}

#[async_trait]
impl<P: Translator + ?Sized> Translator for Limited<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn translate(&self, text: &str, options: &TranslateOptions) -> Result<Translation> {
        self.limit
            .acquire(self.inner.name(), &CancellationToken::new())
            .await?;
        self.inner.translate(text, options).await
    }
}

#[async_trait]
impl<P: Renderer + ?Sized> Renderer for Limited<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn render(&self, prompt: &str, options: &RenderOptions) -> Result<Image> {
        self.limit
            .acquire(self.inner.name(), &CancellationToken::new())
            .await?;
        self.inner.render(prompt, options).await
    }
}
