//! Configuration loading from capstan.toml.

use sandbox::{EngineConfig, DEFAULT_MEMORY_LIMIT};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// LLM backend configuration.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Sandbox limits.
    #[serde(default)]
    pub sandbox: SandboxConfig,
}

/// Backend provider configuration.
#[derive(Debug, Deserialize)]
pub struct BackendConfig {
    /// Chat-completions endpoint base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model to use.
    #[serde(default = "default_model")]
    pub model: String,

    /// API key (if not set, reads from the CAPSTAN_API_KEY env var).
    pub api_key: Option<String>,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
        }
    }
}

/// Sandbox limits.
#[derive(Debug, Deserialize)]
pub struct SandboxConfig {
    /// Heap cap in bytes.
    #[serde(default = "default_memory_limit")]
    pub memory_limit: usize,

    /// Optional wall-clock cap on one evaluation, in milliseconds.
    pub eval_timeout_ms: Option<u64>,
}

fn default_memory_limit() -> usize {
    DEFAULT_MEMORY_LIMIT
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            memory_limit: default_memory_limit(),
            eval_timeout_ms: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, or defaults when it is absent.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Get the API key, falling back to the environment.
    pub fn api_key(&self) -> Result<String> {
        if let Some(key) = &self.backend.api_key {
            return Ok(key.clone());
        }
        std::env::var("CAPSTAN_API_KEY").map_err(|_| Error::MissingApiKey)
    }

    /// The engine limits as an [`EngineConfig`].
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            memory_limit: self.sandbox.memory_limit,
            eval_timeout: self.sandbox.eval_timeout_ms.map(Duration::from_millis),
            ..EngineConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.backend.model, "gpt-4o");
        assert_eq!(config.sandbox.memory_limit, DEFAULT_MEMORY_LIMIT);
        assert!(config.sandbox.eval_timeout_ms.is_none());
    }

    #[test]
    fn sections_override_defaults() {
        let config = Config::parse(
            r#"
[backend]
model = "local-model"
base_url = "http://localhost:8080/v1"

[sandbox]
memory_limit = 1048576
eval_timeout_ms = 2000
"#,
        )
        .unwrap();
        assert_eq!(config.backend.model, "local-model");
        assert_eq!(config.sandbox.memory_limit, 1024 * 1024);
        assert_eq!(
            config.engine_config().eval_timeout,
            Some(Duration::from_millis(2000))
        );
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        assert!(matches!(
            Config::parse("backend = 3"),
            Err(Error::Config(_))
        ));
    }
}
