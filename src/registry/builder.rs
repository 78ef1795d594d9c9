//! Builder for a [`ModelRegistry`].

use std::sync::Arc;

use tracing::debug;

use super::{Capability, ModelRegistry};
use crate::providers::{
    Completer, Embedder, Renderer, Reranker, Synthesizer, Transcriber, Translator,
};
use crate::{Result, SwitchyardError};

/// Collects registrations in order, then freezes them into a registry.
///
/// Registration order matters: the first id registered for a capability
/// becomes its default. Invalid registrations (empty or duplicate ids) are
/// remembered and the first one is reported by [`build`](Self::build).
#[derive(Default)]
pub struct RegistryBuilder {
    registry: ModelRegistry,
    error: Option<SwitchyardError>,
}

/// Generates one by-value registration method.
macro_rules! register {
    ($method:ident, $field:ident, $trait:ident, $cap:expr) => {
        pub fn $method(mut self, id: impl Into<String>, provider: Arc<dyn $trait>) -> Self {
            let id = id.into();
            debug!(capability = %$cap, model = %id, provider = provider.name(), "registering model");
            let result = self.registry.$field.insert($cap, id, provider);
            self.record(result);
            self
        }
    };
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    register!(completer, completers, Completer, Capability::Completer);
    register!(embedder, embedders, Embedder, Capability::Embedder);
    register!(reranker, rerankers, Reranker, Capability::Reranker);
    register!(synthesizer, synthesizers, Synthesizer, Capability::Synthesizer);
    register!(transcriber, transcribers, Transcriber, Capability::Transcriber);
    register!(translator, translators, Translator, Capability::Translator);
    register!(renderer, renderers, Renderer, Capability::Renderer);

    /// Whether `id` has been registered for `capability` so far.
    pub fn contains(&self, capability: Capability, id: &str) -> bool {
        !id.is_empty() && self.registry.contains(capability, id)
    }

    /// Resolve a completer registered so far, e.g. to wrap it in a chain.
    pub fn resolve_completer(&self, id: &str) -> Option<Arc<dyn Completer>> {
        self.registry.completer(id)
    }

    fn record(&mut self, result: Result<()>) {
        if let Err(e) = result
            && self.error.is_none()
        {
            self.error = Some(e);
        }
    }

    /// Freeze the registry, failing with the first invalid registration.
    pub fn build(self) -> Result<ModelRegistry> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.registry),
        }
    }
}
