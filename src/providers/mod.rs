//! Capability traits, decorators and the bundled vendor adapters.
//!
//! The traits in [`traits`] are the seam every vendor adapter implements.
//! Decorators ([`Observed`], [`Limited`], [`Retrying`]) wrap any instance by
//! composition and implement the same traits. [`RoundRobin`] spreads calls
//! over several completers.

#[cfg(any(feature = "openai", feature = "jina"))]
mod http;
#[cfg(feature = "jina")]
pub mod jina;
pub mod limiter;
pub mod observed;
#[cfg(feature = "openai")]
pub mod openai;
pub mod retry;
pub mod router;
pub mod traits;

#[cfg(feature = "jina")]
pub use jina::{JinaClient, JinaEmbedder, JinaReranker};
pub use limiter::{Limited, RateLimit};
pub use observed::Observed;
#[cfg(feature = "openai")]
pub use openai::{OpenAiClient, OpenAiCompleter, OpenAiEmbedder};
pub use retry::{RetryConfig, Retrying};
pub use router::RoundRobin;
pub use traits::{
    Completer, Embedder, Renderer, Reranker, Synthesizer, Transcriber, Translator,
};
