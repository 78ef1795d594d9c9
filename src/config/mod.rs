//! Configuration loading and registry wiring.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.switchyard/config.toml` (user)
//! 3. `/etc/switchyard/config.toml` (system)
//!
//! API keys live in a `secrets.toml` beside the config file (see
//! [`Secrets`]). [`Config::build_registry`] turns the parsed file into a
//! [`ModelRegistry`](crate::registry::ModelRegistry).

mod secrets;
mod wiring;

pub use secrets::{ApiKeySecret, Secrets};

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::providers::RetryConfig;
use crate::registry::Capability;
use crate::{Result, SwitchyardError};

/// Parsed configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub chains: Vec<ChainConfig>,
    #[serde(default)]
    pub routers: Vec<RouterConfig>,
    /// Where the file was loaded from, when loaded from disk.
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

/// Vendor dialects with a bundled adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "jina")]
    Jina,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Jina => "jina",
        }
    }

    /// Capabilities the bundled adapter offers.
    pub fn supports(&self, capability: Capability) -> bool {
        match self {
            ProviderKind::OpenAi => {
                matches!(capability, Capability::Completer | Capability::Embedder)
            }
            ProviderKind::Jina => matches!(capability, Capability::Embedder | Capability::Reranker),
        }
    }

    /// Environment variable consulted when neither the secrets file nor
    /// `token_env` yields a key.
    pub fn default_token_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Jina => "JINA_API_KEY",
        }
    }
}

/// One `[[providers]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Provider id; also the key of its entry in `secrets.toml`.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ProviderKind,
    /// Base URL; the adapter's public endpoint when unset.
    #[serde(default)]
    pub url: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub token_env: Option<String>,
    /// Requests per second shared by every model of this provider.
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Request timeout in seconds (default: 120).
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

/// One `[[providers.models]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Identifier callers use.
    pub id: String,
    #[serde(rename = "type")]
    pub capability: Capability,
    /// Vendor-side model name; defaults to `id`.
    #[serde(default)]
    pub model: Option<String>,
    /// Extra identifiers resolving to the same instance.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Requests per second for this model alone, overriding the provider's.
    #[serde(default)]
    pub limit: Option<u32>,
}

impl ModelConfig {
    pub fn vendor_model(&self) -> &str {
        self.model.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainKind {
    Toolbox,
}

/// One `[[chains]]` entry: a completer composed with tools.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ChainKind,
    /// Id of the completer the chain drives.
    pub completer: String,
    /// Names of tools from the host's tool set.
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub max_rounds: Option<usize>,
    #[serde(default)]
    pub temperature: Option<f32>,
    /// System prompt placed before the caller's messages.
    #[serde(default)]
    pub system: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterKind {
    RoundRobin,
}

/// One `[[routers]]` entry: a completer spreading calls over others.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouterConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: RouterKind,
    /// Ids of the member completers.
    pub models: Vec<String>,
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.switchyard/config.toml`
    /// 3. `/etc/switchyard/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        Self::load_from(&path)
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            SwitchyardError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        let mut config: Config = toml::from_str(&content).map_err(|e| {
            SwitchyardError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })?;
        config.path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| SwitchyardError::Configuration(format!("Failed to parse config: {e}")))
    }

    /// Load the secrets file beside the loaded config, if there is one.
    pub fn secrets(&self) -> Result<Secrets> {
        match self.path.as_deref().and_then(Path::parent) {
            Some(dir) => Secrets::load_from_dir(dir),
            None => Ok(Secrets::default()),
        }
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(SwitchyardError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".switchyard").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/switchyard/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(SwitchyardError::Configuration(
            "No config file found. Create ~/.switchyard/config.toml or /etc/switchyard/config.toml"
                .to_string(),
        ))
    }
}
