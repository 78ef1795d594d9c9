//! API keys, kept apart from the main configuration.
//!
//! `secrets.toml` sits beside `config.toml` and maps provider ids to keys:
//!
//! ```toml
//! [openai]
//! api_key = "sk-..."
//! ```
//!
//! On Unix the file must not be readable by group or others (0600 or 0400).

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::ProviderConfig;
use crate::{Result, SwitchyardError};

/// Secrets configuration (API keys by provider id).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Secrets {
    keys: HashMap<String, ApiKeySecret>,
}

/// A single API key secret.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySecret {
    pub api_key: String,
}

impl Secrets {
    /// Load `secrets.toml` from `dir` with a permission check.
    ///
    /// Returns empty secrets if the file does not exist (providers may use
    /// env vars).
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let path = dir.join("secrets.toml");
        if !path.exists() {
            return Ok(Secrets::default());
        }
        Self::check_permissions(&path)?;
        Self::load_from_file(&path)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            SwitchyardError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            SwitchyardError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            SwitchyardError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(SwitchyardError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    pub fn insert(&mut self, provider: impl Into<String>, api_key: impl Into<String>) {
        self.keys.insert(
            provider.into(),
            ApiKeySecret {
                api_key: api_key.into(),
            },
        );
    }

    /// Key for a provider, falling back to its environment variable.
    ///
    /// The variable is the provider's `token_env` when set, otherwise the
    /// default variable of its type.
    pub fn api_key(&self, provider: &ProviderConfig) -> Option<String> {
        self.keys
            .get(&provider.id)
            .map(|s| s.api_key.clone())
            .or_else(|| {
                let var = provider
                    .token_env
                    .as_deref()
                    .unwrap_or_else(|| provider.kind.default_token_env());
                std::env::var(var).ok()
            })
            .filter(|key| !key.is_empty())
    }
}
