//! LLM integration for the auto-reply pipeline.
//!
//! Supports:
//! - **Ollama**: self-hosted, `/api/generate`
//! - **Gemini**: managed, `generateContent` with a native response schema
//!
//! Both speak plain HTTP through reqwest behind the `LlmProvider` trait.

pub mod gemini;
pub mod ollama;
pub mod provider;
pub mod retry;

pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use provider::*;
pub use retry::RetryPolicy;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use crate::config::{self, Env};
use crate::error::{ConfigError, LlmError};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434/api/generate";
pub const DEFAULT_OLLAMA_MODEL: &str = "mistral:7b-instruct-v0.2-q4_0";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Per-attempt request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(180);

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Ollama,
    Gemini,
}

impl FromStr for LlmBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "gemini" => Ok(Self::Gemini),
            other => Err(format!("unknown backend {other:?} (expected ollama or gemini)")),
        }
    }
}

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub ollama_url: String,
    pub ollama_model: String,
    pub gemini_api_key: Option<SecretString>,
    pub gemini_model: String,
    pub gemini_api_base: String,
    pub timeout: Duration,
    pub max_attempts: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: LlmBackend::Ollama,
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_attempts: retry::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl LlmConfig {
    /// Build from `LLM_*`, `OLLAMA_*` and `GEMINI_*` variables.
    ///
    /// `GEMINI_API_KEY` is only required when the Gemini backend is selected.
    pub fn from_lookup(env: Env<'_>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let backend = config::parse_or(env, "LLM_BACKEND", defaults.backend)?;

        let gemini_api_key = match backend {
            LlmBackend::Gemini => Some(SecretString::from(config::required(
                env,
                "GEMINI_API_KEY",
            )?)),
            LlmBackend::Ollama => config::var(env, "GEMINI_API_KEY").map(SecretString::from),
        };

        let timeout_secs = config::parse_or(env, "LLM_TIMEOUT_SECS", defaults.timeout.as_secs())?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "LLM_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        let max_attempts = config::parse_or(env, "LLM_MAX_ATTEMPTS", defaults.max_attempts)?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "LLM_MAX_ATTEMPTS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            backend,
            ollama_url: config::var(env, "OLLAMA_URL").unwrap_or(defaults.ollama_url),
            ollama_model: config::var(env, "OLLAMA_MODEL").unwrap_or(defaults.ollama_model),
            gemini_api_key,
            gemini_model: config::var(env, "GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            gemini_api_base: config::var(env, "GEMINI_API_BASE")
                .unwrap_or(defaults.gemini_api_base),
            timeout: Duration::from_secs(timeout_secs),
            max_attempts,
        })
    }

    /// Model name of the selected backend.
    pub fn model(&self) -> &str {
        match self.backend {
            LlmBackend::Ollama => &self.ollama_model,
            LlmBackend::Gemini => &self.gemini_model,
        }
    }
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    match config.backend {
        LlmBackend::Ollama => {
            tracing::info!("Using Ollama (model: {}, url: {})", config.ollama_model, config.ollama_url);
            let provider =
                OllamaProvider::new(&config.ollama_url, &config.ollama_model, config.timeout)?;
            Ok(Arc::new(provider))
        }
        LlmBackend::Gemini => {
            let api_key = config
                .gemini_api_key
                .clone()
                .ok_or_else(|| LlmError::RequestFailed {
                    provider: "gemini".to_string(),
                    reason: "GEMINI_API_KEY is not set".to_string(),
                })?;
            tracing::info!("Using Gemini (model: {})", config.gemini_model);
            let provider = GeminiProvider::new(
                &config.gemini_api_base,
                &config.gemini_model,
                api_key,
                config.timeout,
            )?;
            Ok(Arc::new(provider))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&'static str, &'static str)]) -> HashMap<&'static str, &'static str> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn backend_parses_case_insensitively() {
        assert_eq!("Gemini".parse::<LlmBackend>().unwrap(), LlmBackend::Gemini);
        assert_eq!("OLLAMA".parse::<LlmBackend>().unwrap(), LlmBackend::Ollama);
        assert!("openai".parse::<LlmBackend>().is_err());
    }

    #[test]
    fn gemini_requires_api_key() {
        let map = env_of(&[("LLM_BACKEND", "gemini")]);
        let env = |key: &str| map.get(key).map(|v| v.to_string());
        match LlmConfig::from_lookup(&env) {
            Err(ConfigError::CredentialsMissing { key }) => assert_eq!(key, "GEMINI_API_KEY"),
            other => panic!("Expected CredentialsMissing, got {:?}", other),
        }
    }

    #[test]
    fn ollama_does_not_need_api_key() {
        let map = env_of(&[("OLLAMA_MODEL", "llama3"), ("LLM_TIMEOUT_SECS", "30")]);
        let env = |key: &str| map.get(key).map(|v| v.to_string());
        let config = LlmConfig::from_lookup(&env).unwrap();
        assert_eq!(config.backend, LlmBackend::Ollama);
        assert_eq!(config.model(), "llama3");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn zero_attempts_rejected() {
        let map = env_of(&[("LLM_MAX_ATTEMPTS", "0")]);
        let env = |key: &str| map.get(key).map(|v| v.to_string());
        assert!(matches!(
            LlmConfig::from_lookup(&env),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn zero_timeout_rejected() {
        let map = env_of(&[("LLM_TIMEOUT_SECS", "0")]);
        let env = |key: &str| map.get(key).map(|v| v.to_string());
        match LlmConfig::from_lookup(&env) {
            Err(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, "LLM_TIMEOUT_SECS"),
            other => panic!("Expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_create_ollama_provider() {
        let provider = create_provider(&LlmConfig::default()).unwrap();
        assert_eq!(provider.model_name(), DEFAULT_OLLAMA_MODEL);
        assert!(!provider.supports_response_schema());
    }

    #[test]
    fn test_create_gemini_provider() {
        let config = LlmConfig {
            backend: LlmBackend::Gemini,
            gemini_api_key: Some(SecretString::from("test-key".to_string())),
            ..LlmConfig::default()
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), DEFAULT_GEMINI_MODEL);
        assert!(provider.supports_response_schema());
    }

    #[test]
    fn test_create_gemini_without_key_fails() {
        let config = LlmConfig {
            backend: LlmBackend::Gemini,
            ..LlmConfig::default()
        };
        assert!(create_provider(&config).is_err());
    }
}
