//! Turn a parsed [`Config`] into a [`ModelRegistry`].

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::{ChainConfig, ChainKind, Config, ModelConfig, ProviderConfig, RouterConfig, RouterKind, Secrets};
use crate::agent::{Toolbox, ToolboxConfig};
use crate::providers::{
    Completer, Embedder, Limited, Observed, RateLimit, Reranker, RetryConfig, Retrying, RoundRobin,
};
use crate::registry::{Capability, ModelRegistry, RegistryBuilder};
use crate::tool::{Tool, ToolSet};
use crate::types::Message;
use crate::{Result, SwitchyardError};

#[cfg(feature = "jina")]
use crate::providers::jina::JinaClient;
#[cfg(feature = "openai")]
use crate::providers::openai::OpenAiClient;

/// Decorators applied to every model of one provider.
///
/// The limiter sits inside the retry loop so every attempt waits for its
/// own permit.
struct Wrapping<'a> {
    provider: &'a str,
    retry: Option<&'a RetryConfig>,
    limit: Option<RateLimit>,
}

impl Wrapping<'_> {
    fn completer(&self, model: &str, inner: Arc<dyn Completer>) -> Arc<dyn Completer> {
        let mut inner = inner;
        if let Some(limit) = &self.limit {
            inner = Arc::new(Limited::new(inner, limit.clone()));
        }
        if let Some(retry) = self.retry {
            inner = Arc::new(Retrying::new(inner, retry.clone()));
        }
        Arc::new(Observed::new(inner, self.provider, model))
    }

    fn embedder(&self, model: &str, inner: Arc<dyn Embedder>) -> Arc<dyn Embedder> {
        let mut inner = inner;
        if let Some(limit) = &self.limit {
            inner = Arc::new(Limited::new(inner, limit.clone()));
        }
        if let Some(retry) = self.retry {
            inner = Arc::new(Retrying::new(inner, retry.clone()));
        }
        Arc::new(Observed::new(inner, self.provider, model))
    }

    fn reranker(&self, model: &str, inner: Arc<dyn Reranker>) -> Arc<dyn Reranker> {
        let mut inner = inner;
        if let Some(limit) = &self.limit {
            inner = Arc::new(Limited::new(inner, limit.clone()));
        }
        Arc::new(Observed::new(inner, self.provider, model))
    }
}

/// A model instance of whichever capability its entry declares.
enum Instance {
    Completer(Arc<dyn Completer>),
    Embedder(Arc<dyn Embedder>),
    Reranker(Arc<dyn Reranker>),
}

/// Per-provider vendor client.
enum Client {
    #[cfg(feature = "openai")]
    OpenAi(OpenAiClient),
    #[cfg(feature = "jina")]
    Jina(JinaClient),
}

impl Config {
    /// Build the registry described by this configuration.
    ///
    /// Registration follows file order: providers and their models first,
    /// then chains, then routers. The first model of each capability becomes
    /// its default. `tools` supplies the implementations chains refer to by
    /// name.
    ///
    /// Every inconsistency (an unsupported model type, a duplicate id, a
    /// reference to an unknown completer or tool) is a
    /// [`SwitchyardError::Configuration`] error.
    pub fn build_registry(&self, secrets: &Secrets, tools: &ToolSet) -> Result<ModelRegistry> {
        let mut builder = ModelRegistry::builder();

        for provider in &self.providers {
            builder = register_provider(builder, provider, secrets)?;
        }
        for chain in &self.chains {
            builder = register_chain(builder, chain, tools)?;
        }
        for router in &self.routers {
            builder = register_router(builder, router)?;
        }

        let registry = builder.build()?;
        info!(
            models = registry.len(),
            default = registry.default_id(Capability::Completer).unwrap_or(""),
            "registry ready"
        );
        Ok(registry)
    }
}

fn register_provider(
    mut builder: RegistryBuilder,
    provider: &ProviderConfig,
    secrets: &Secrets,
) -> Result<RegistryBuilder> {
    let client = client(provider, secrets)?;
    let shared_limit = provider.limit.map(RateLimit::per_second).transpose()?;

    for model in &provider.models {
        if !provider.kind.supports(model.capability) {
            return Err(SwitchyardError::Configuration(format!(
                "provider '{}' of type {} does not support {} models ({})",
                provider.id,
                provider.kind.as_str(),
                model.capability,
                model.id
            )));
        }

        let limit = match model.limit {
            Some(rate) => Some(RateLimit::per_second(rate)?),
            None => shared_limit.clone(),
        };
        let wrapping = Wrapping {
            provider: &provider.id,
            retry: provider.retry.as_ref(),
            limit,
        };

        let instance = match model.capability {
            Capability::Completer => {
                Instance::Completer(wrapping.completer(&model.id, completer(&client, model)?))
            }
            Capability::Embedder => {
                Instance::Embedder(wrapping.embedder(&model.id, embedder(&client, model)?))
            }
            Capability::Reranker => {
                Instance::Reranker(wrapping.reranker(&model.id, reranker(&client, model)?))
            }
            other => {
                return Err(SwitchyardError::Configuration(format!(
                    "no bundled adapter offers {other} models ({})",
                    model.id
                )));
            }
        };

        for id in std::iter::once(&model.id).chain(&model.aliases) {
            builder = match &instance {
                Instance::Completer(p) => builder.completer(id.as_str(), Arc::clone(p)),
                Instance::Embedder(p) => builder.embedder(id.as_str(), Arc::clone(p)),
                Instance::Reranker(p) => builder.reranker(id.as_str(), Arc::clone(p)),
            };
        }
    }
    Ok(builder)
}

fn client(provider: &ProviderConfig, secrets: &Secrets) -> Result<Client> {
    let timeout = Duration::from_secs(provider.timeout_secs.unwrap_or(120));
    let api_key = secrets.api_key(provider).unwrap_or_default();

    match provider.kind {
        #[cfg(feature = "openai")]
        super::ProviderKind::OpenAi => {
            let url = provider
                .url
                .as_deref()
                .unwrap_or(crate::providers::openai::DEFAULT_BASE_URL);
            Ok(Client::OpenAi(
                OpenAiClient::with_timeout(url, timeout)?.with_api_key(api_key),
            ))
        }
        #[cfg(feature = "jina")]
        super::ProviderKind::Jina => {
            let url = provider
                .url
                .as_deref()
                .unwrap_or(crate::providers::jina::DEFAULT_BASE_URL);
            Ok(Client::Jina(
                JinaClient::with_timeout(url, timeout)?.with_api_key(api_key),
            ))
        }
        #[allow(unreachable_patterns)]
        kind => Err(SwitchyardError::Configuration(format!(
            "provider type {} is not compiled in (enable the '{}' feature)",
            kind.as_str(),
            kind.as_str()
        ))),
    }
}

fn completer(client: &Client, model: &ModelConfig) -> Result<Arc<dyn Completer>> {
    match client {
        #[cfg(feature = "openai")]
        Client::OpenAi(c) => Ok(Arc::new(c.completer(model.vendor_model()))),
        #[allow(unreachable_patterns)]
        _ => Err(unsupported(model)),
    }
}

fn embedder(client: &Client, model: &ModelConfig) -> Result<Arc<dyn Embedder>> {
    match client {
        #[cfg(feature = "openai")]
        Client::OpenAi(c) => Ok(Arc::new(c.embedder(model.vendor_model()))),
        #[cfg(feature = "jina")]
        Client::Jina(c) => Ok(Arc::new(c.embedder(model.vendor_model()))),
        #[allow(unreachable_patterns)]
        _ => Err(unsupported(model)),
    }
}

fn reranker(client: &Client, model: &ModelConfig) -> Result<Arc<dyn Reranker>> {
    match client {
        #[cfg(feature = "jina")]
        Client::Jina(c) => Ok(Arc::new(c.reranker(model.vendor_model()))),
        #[allow(unreachable_patterns)]
        _ => Err(unsupported(model)),
    }
}

fn unsupported(model: &ModelConfig) -> SwitchyardError {
    SwitchyardError::Configuration(format!(
        "model '{}' has unsupported type {}",
        model.id, model.capability
    ))
}

fn register_chain(
    builder: RegistryBuilder,
    chain: &ChainConfig,
    tools: &ToolSet,
) -> Result<RegistryBuilder> {
    match chain.kind {
        ChainKind::Toolbox => {}
    }

    let completer = builder.resolve_completer(&chain.completer).ok_or_else(|| {
        SwitchyardError::Configuration(format!(
            "chain '{}' references unknown completer '{}'",
            chain.id, chain.completer
        ))
    })?;

    let chain_tools = chain
        .tools
        .iter()
        .map(|name| {
            tools.get(name).ok_or_else(|| {
                SwitchyardError::Configuration(format!(
                    "chain '{}' references unknown tool '{name}'",
                    chain.id
                ))
            })
        })
        .collect::<Result<Vec<Arc<dyn Tool>>>>()?;

    let mut config = ToolboxConfig::default();
    match chain.max_rounds {
        Some(0) => {
            return Err(SwitchyardError::Configuration(format!(
                "chain '{}' must allow at least one round",
                chain.id
            )));
        }
        Some(max_rounds) => config.max_rounds = max_rounds,
        None => {}
    }
    config.temperature = chain.temperature;
    config.messages = chain.system.iter().map(Message::system).collect();

    let toolbox = Toolbox::new(completer, chain_tools)
        .with_name(chain.id.clone())
        .with_config(config);
    let toolbox: Arc<dyn Completer> = Arc::new(Observed::new(
        Arc::new(toolbox),
        "toolbox",
        chain.id.as_str(),
    ));
    Ok(builder.completer(chain.id.as_str(), toolbox))
}

fn register_router(builder: RegistryBuilder, router: &RouterConfig) -> Result<RegistryBuilder> {
    match router.kind {
        RouterKind::RoundRobin => {}
    }

    let members = router
        .models
        .iter()
        .map(|id| {
            builder.resolve_completer(id).ok_or_else(|| {
                SwitchyardError::Configuration(format!(
                    "router '{}' references unknown completer '{id}'",
                    router.id
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let router_completer: Arc<dyn Completer> = Arc::new(RoundRobin::new(router.id.clone(), members)?);
    Ok(builder.completer(router.id.as_str(), router_completer))
}
