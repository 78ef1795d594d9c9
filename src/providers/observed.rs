//! Telemetry decorator.
//!
//! [`Observed`] wraps any capability instance, runs each call inside a
//! tracing span and records request metrics (see [`crate::telemetry`]).
//! Results and errors pass through unchanged.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{Instrument, info_span};

use super::traits::{
    Completer, Embedder, Renderer, Reranker, Synthesizer, Transcriber, Translator,
};
use crate::Result;
use crate::telemetry;
use crate::types::{
    CompleteOptions, Completion, Embedding, File, Image, Message, Ranking, RenderOptions,
    RerankOptions, Synthesis, SynthesizeOptions, TranscribeOptions, Transcription,
    TranslateOptions, Translation, Usage,
};

/// Decorator adding a span and request metrics to every call.
pub struct Observed<P: ?Sized> {
    inner: Arc<P>,
    provider: String,
    model: String,
}

impl<P: ?Sized> Observed<P> {
    /// `provider` labels the metrics; `model` is recorded on the span.
    pub fn new(inner: Arc<P>, provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            inner,
            provider: provider.into(),
            model: model.into(),
        }
    }

    async fn observe<T, Fut>(&self, operation: &'static str, call: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        let span = info_span!(
            "provider.call",
            provider = %self.provider,
            model = %self.model,
            operation,
        );
        let start = Instant::now();
        let result = call.instrument(span).await;
        record_request(operation, &self.provider, start, result.is_ok());
        result
    }
}

/// Record request outcome metrics (counter + histogram).
fn record_request(operation: &'static str, provider: &str, start: Instant, ok: bool) {
    let status = if ok { "ok" } else { "error" };
    let elapsed = start.elapsed().as_secs_f64();
    metrics::counter!(telemetry::REQUESTS_TOTAL,
        "provider" => provider.to_owned(),
        "operation" => operation,
        "status" => status,
    )
    .increment(1);
    metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
        "provider" => provider.to_owned(),
        "operation" => operation,
    )
    .record(elapsed);
}

/// Record token usage reported with a completion.
fn record_token_usage(provider: &str, usage: &Usage) {
    metrics::counter!(telemetry::TOKENS_TOTAL,
        "provider" => provider.to_owned(),
        "direction" => "input",
    )
    .increment(u64::from(usage.input_tokens));
    metrics::counter!(telemetry::TOKENS_TOTAL,
        "provider" => provider.to_owned(),
        "direction" => "output",
    )
    .increment(u64::from(usage.output_tokens));
}

#[async_trait]
impl<P: Completer + ?Sized> Completer for Observed<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(&self, messages: &[Message], options: CompleteOptions) -> Result<Completion> {
        let completion = self
            .observe("complete", self.inner.complete(messages, options))
            .await?;
        if let Some(usage) = &completion.usage {
            record_token_usage(&self.provider, usage);
        }
        Ok(completion)
    }
}

#[async_trait]
impl<P: Embedder + ?Sized> Embedder for Observed<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.observe("embed", self.inner.embed(text)).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        self.observe("embed_batch", self.inner.embed_batch(texts))
            .await
    }
}

#[async_trait]
impl<P: Reranker + ?Sized> Reranker for Observed<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn rerank(
        &self,
        query: &str,
        texts: &[&str],
        options: &RerankOptions,
    ) -> Result<Vec<Ranking>> {
        self.observe("rerank", self.inner.rerank(query, texts, options))
            .await
    }
}

#[async_trait]
impl<P: Synthesizer + ?Sized> Synthesizer for Observed<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn synthesize(&self, text: &str, options: &SynthesizeOptions) -> Result<Synthesis> {
        self.observe("synthesize", self.inner.synthesize(text, options))
            .await
    }
}

#[async_trait]
impl<P: Transcriber + ?Sized> Transcriber for Observed<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn transcribe(
        &self,
        input: &File,
        options: &TranscribeOptions,
    ) -> Result<Transcription> {
        self.observe("transcribe", self.inner.transcribe(input, options))
            .await
    }
}

#[async_trait]
impl<P: Translator + ?Sized> Translator for Observed<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn translate(&self, text: &str, options: &TranslateOptions) -> Result<Translation> {
        self.observe("translate", self.inner.translate(text, options))
            .await
    }
}

#[async_trait]
impl<P: Renderer + ?Sized> Renderer for Observed<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn render(&self, prompt: &str, options: &RenderOptions) -> Result<Image> {
        self.observe("render", self.inner.render(prompt, options))
            .await
    }
}
