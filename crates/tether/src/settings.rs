//! Provider settings loaded from the environment.
//!
//! Three values are required before an agent can be built: an API key, the
//! provider's base URL and a model identifier. They are read from the
//! process environment after loading a `.env` file from the working
//! directory (or any parent) when one exists.

use crate::error::ConfigError;
use std::fmt;
use tracing::debug;

pub const API_KEY_VAR: &str = "API_KEY";
pub const BASE_URL_VAR: &str = "BASE_URL";
pub const MODEL_VAR: &str = "MODEL_NAME";
/// Accepted in place of [`MODEL_VAR`].
pub const MODEL_FALLBACK_VAR: &str = "QWEN_PLUS_MODEL_NAME";

/// Credentials and endpoint for an OpenAI-compatible provider.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl ProviderSettings {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenv::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(e) => debug!("No .env loaded: {e}"),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup.
    ///
    /// Empty values count as missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| get(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()));

        let api_key = require(API_KEY_VAR)?;
        let base_url = require(BASE_URL_VAR)?;
        let model = get(MODEL_VAR)
            .or_else(|| get(MODEL_FALLBACK_VAR))
            .ok_or_else(|| ConfigError::MissingVar(MODEL_VAR.to_string()))?;

        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "{BASE_URL_VAR} must be an http(s) URL, got '{base_url}'"
            )));
        }

        Ok(Self {
            api_key,
            base_url,
            model,
        })
    }
}
