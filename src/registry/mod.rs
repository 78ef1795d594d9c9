//! Model registry: resolve a caller-supplied model id to a provider.
//!
//! Every capability has its own map. Registering a completer named `gpt-4o`
//! says nothing about an embedder of the same name, even when both are
//! backed by the same vendor client.
//!
//! # Default model
//!
//! The first provider registered for a capability is also installed under
//! the empty id `""`, so a request that names no model resolves to it.
//! Later registrations never move the default.
//!
//! The registry is assembled once through [`RegistryBuilder`] and is
//! read-only afterwards; share it behind an `Arc` without locking.

mod builder;

pub use builder::RegistryBuilder;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::providers::{
    Completer, Embedder, Renderer, Reranker, Synthesizer, Transcriber, Translator,
};
use crate::{Result, SwitchyardError};

/// Capability families a provider can be registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Completer,
    Embedder,
    Reranker,
    Synthesizer,
    Transcriber,
    Translator,
    Renderer,
}

impl Capability {
    pub const ALL: [Capability; 7] = [
        Capability::Completer,
        Capability::Embedder,
        Capability::Reranker,
        Capability::Synthesizer,
        Capability::Transcriber,
        Capability::Translator,
        Capability::Renderer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Completer => "completer",
            Capability::Embedder => "embedder",
            Capability::Reranker => "reranker",
            Capability::Synthesizer => "synthesizer",
            Capability::Transcriber => "transcriber",
            Capability::Translator => "translator",
            Capability::Renderer => "renderer",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = SwitchyardError;

    fn from_str(s: &str) -> Result<Self> {
        Capability::ALL
            .into_iter()
            .find(|cap| cap.as_str() == s)
            .ok_or_else(|| SwitchyardError::Configuration(format!("unknown model type: {s}")))
    }
}

/// A registered model, as listed by [`ModelRegistry::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    pub capability: Capability,
    /// Name reported by the provider instance.
    pub provider: String,
    /// Whether this entry is the capability's default.
    pub default: bool,
}

/// Providers of one capability, keyed by model id.
pub(crate) struct Slot<T: ?Sized> {
    entries: HashMap<String, Arc<T>>,
    // registration order, excluding the "" alias
    order: Vec<String>,
}

impl<T: ?Sized> Default for Slot<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<T: ?Sized> Slot<T> {
    pub(crate) fn insert(&mut self, capability: Capability, id: String, provider: Arc<T>) -> Result<()> {
        if id.is_empty() {
            return Err(SwitchyardError::Configuration(format!(
                "{capability} registered with an empty id"
            )));
        }
        if self.entries.contains_key(&id) {
            return Err(SwitchyardError::Configuration(format!(
                "duplicate {capability} id: {id}"
            )));
        }

        if self.order.is_empty() {
            self.entries.insert(String::new(), Arc::clone(&provider));
        }
        self.entries.insert(id.clone(), provider);
        self.order.push(id);
        Ok(())
    }

    fn get(&self, id: &str) -> Option<Arc<T>> {
        self.entries.get(id).cloned()
    }

    fn default_id(&self) -> Option<&str> {
        self.order.first().map(String::as_str)
    }

    fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

/// Read-only map from `(capability, model id)` to provider instance.
#[derive(Default)]
pub struct ModelRegistry {
    pub(crate) completers: Slot<dyn Completer>,
    pub(crate) embedders: Slot<dyn Embedder>,
    pub(crate) rerankers: Slot<dyn Reranker>,
    pub(crate) synthesizers: Slot<dyn Synthesizer>,
    pub(crate) transcribers: Slot<dyn Transcriber>,
    pub(crate) translators: Slot<dyn Translator>,
    pub(crate) renderers: Slot<dyn Renderer>,
}

/// Generates the resolve/require pair for one capability.
macro_rules! resolvers {
    ($field:ident, $trait:ident, $get:ident, $require:ident, $cap:expr) => {
        /// Resolve a model id; `""` resolves to the default. `None` on a miss.
        pub fn $get(&self, id: &str) -> Option<Arc<dyn $trait>> {
            self.$field.get(id)
        }

        /// Like the plain resolver, but a miss is
        /// [`SwitchyardError::ModelNotFound`].
        pub fn $require(&self, id: &str) -> Result<Arc<dyn $trait>> {
            self.$field.get(id).ok_or_else(|| {
                tracing::debug!(capability = %$cap, model = id, "model not found");
                SwitchyardError::ModelNotFound(id.to_string())
            })
        }
    };
}

impl ModelRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    resolvers!(completers, Completer, completer, require_completer, Capability::Completer);
    resolvers!(embedders, Embedder, embedder, require_embedder, Capability::Embedder);
    resolvers!(rerankers, Reranker, reranker, require_reranker, Capability::Reranker);
    resolvers!(synthesizers, Synthesizer, synthesizer, require_synthesizer, Capability::Synthesizer);
    resolvers!(transcribers, Transcriber, transcriber, require_transcriber, Capability::Transcriber);
    resolvers!(translators, Translator, translator, require_translator, Capability::Translator);
    resolvers!(renderers, Renderer, renderer, require_renderer, Capability::Renderer);

    /// Whether `id` resolves for `capability`.
    pub fn contains(&self, capability: Capability, id: &str) -> bool {
        match capability {
            Capability::Completer => self.completers.get(id).is_some(),
            Capability::Embedder => self.embedders.get(id).is_some(),
            Capability::Reranker => self.rerankers.get(id).is_some(),
            Capability::Synthesizer => self.synthesizers.get(id).is_some(),
            Capability::Transcriber => self.transcribers.get(id).is_some(),
            Capability::Translator => self.translators.get(id).is_some(),
            Capability::Renderer => self.renderers.get(id).is_some(),
        }
    }

    /// Id installed as the default of `capability`, if any.
    pub fn default_id(&self, capability: Capability) -> Option<&str> {
        match capability {
            Capability::Completer => self.completers.default_id(),
            Capability::Embedder => self.embedders.default_id(),
            Capability::Reranker => self.rerankers.default_id(),
            Capability::Synthesizer => self.synthesizers.default_id(),
            Capability::Transcriber => self.transcribers.default_id(),
            Capability::Translator => self.translators.default_id(),
            Capability::Renderer => self.renderers.default_id(),
        }
    }

    /// All registered models, grouped by capability in registration order.
    pub fn list(&self) -> Vec<ModelEntry> {
        let mut entries = Vec::new();
        collect(&mut entries, Capability::Completer, &self.completers, |p| p.name());
        collect(&mut entries, Capability::Embedder, &self.embedders, |p| p.name());
        collect(&mut entries, Capability::Reranker, &self.rerankers, |p| p.name());
        collect(&mut entries, Capability::Synthesizer, &self.synthesizers, |p| p.name());
        collect(&mut entries, Capability::Transcriber, &self.transcribers, |p| p.name());
        collect(&mut entries, Capability::Translator, &self.translators, |p| p.name());
        collect(&mut entries, Capability::Renderer, &self.renderers, |p| p.name());
        entries
    }

    /// Number of registered ids across all capabilities.
    pub fn len(&self) -> usize {
        self.completers.order.len()
            + self.embedders.order.len()
            + self.rerankers.order.len()
            + self.synthesizers.order.len()
            + self.transcribers.order.len()
            + self.translators.order.len()
            + self.renderers.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn collect<T: ?Sized>(
    out: &mut Vec<ModelEntry>,
    capability: Capability,
    slot: &Slot<T>,
    name: impl Fn(&T) -> &str,
) {
    let default = slot.default_id();
    for id in slot.ids() {
        if let Some(provider) = slot.entries.get(id) {
            out.push(ModelEntry {
                id: id.to_string(),
                capability,
                provider: name(provider.as_ref()).to_string(),
                default: default == Some(id),
            });
        }
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("completers", &self.completers.order)
            .field("embedders", &self.embedders.order)
            .field("rerankers", &self.rerankers.order)
            .field("synthesizers", &self.synthesizers.order)
            .field("transcribers", &self.transcribers.order)
            .field("translators", &self.translators.order)
            .field("renderers", &self.renderers.order)
            .finish()
    }
}
