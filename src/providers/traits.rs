//! Capability traits implemented by vendor adapters.
//!
//! Each capability has its own trait rather than one "god trait". A vendor
//! client implements whichever capabilities it offers, and the registry
//! keeps one independent map per capability. Decorators
//! ([`Observed`](super::Observed), [`Limited`](super::Limited),
//! [`Retrying`](super::Retrying)) implement the same traits and forward to
//! the wrapped instance.
//!
//! # The `Completer` contract
//!
//! - `messages` is the ordered, non-empty history. It is borrowed and never
//!   mutated.
//! - With `options.stream` set, the adapter sends one delta per fragment in
//!   order, stops after the delta carrying a finish reason, and still returns
//!   the fully accumulated [`Completion`]. The sink is owned by the options
//!   and therefore closed when `complete` returns, on success and on error.
//! - Without a sink the call is one blocking round trip.
//! - Failures are returned as errors, never panics. Cancellation through
//!   `options.cancel` yields [`SwitchyardError::Cancelled`](crate::SwitchyardError::Cancelled).

use async_trait::async_trait;

use crate::Result;
use crate::types::{
    CompleteOptions, Completion, Embedding, File, Image, Message, Ranking, RenderOptions,
    RerankOptions, Synthesis, SynthesizeOptions, TranscribeOptions, Transcription,
    TranslateOptions, Translation,
};

// ============================================================================
// Completer
// ============================================================================

/// Turns a message history into a model reply, optionally incrementally.
#[async_trait]
pub trait Completer: Send + Sync {
    /// Provider name for logging/debugging.
    fn name(&self) -> &str;

    /// Run one completion. See the module docs for the contract.
    async fn complete(&self, messages: &[Message], options: CompleteOptions)
    -> Result<Completion>;
}

// ============================================================================
// Embedder
// ============================================================================

/// Provider for text embeddings.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Provider name for logging/debugging.
    fn name(&self) -> &str;

    /// Generate embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Embedding>;

    /// Generate embeddings for multiple texts (batch).
    ///
    /// Default implementation calls `embed` sequentially.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }
}

// ============================================================================
// Reranker
// ============================================================================

/// Scores texts by relevance to a query.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Provider name for logging/debugging.
    fn name(&self) -> &str;

    /// Rank `texts` against `query`, best first.
    async fn rerank(
        &self,
        query: &str,
        texts: &[&str],
        options: &RerankOptions,
    ) -> Result<Vec<Ranking>>;
}

// ============================================================================
// Speech and language capabilities
// ============================================================================

/// Text to speech.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Provider name for logging/debugging.
    fn name(&self) -> &str;

    async fn synthesize(&self, text: &str, options: &SynthesizeOptions) -> Result<Synthesis>;
}

/// Speech to text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Provider name for logging/debugging.
    fn name(&self) -> &str;

    async fn transcribe(&self, input: &File, options: &TranscribeOptions)
    -> Result<Transcription>;
}

/// Text to text in another language.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Provider name for logging/debugging.
    fn name(&self) -> &str;

    async fn translate(&self, text: &str, options: &TranslateOptions) -> Result<Translation>;
}

// ============================================================================
// Renderer
// ============================================================================

/// Text to image.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Provider name for logging/debugging.
    fn name(&self) -> &str;

    async fn render(&self, prompt: &str, options: &RenderOptions) -> Result<Image>;
}
