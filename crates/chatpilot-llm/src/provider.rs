//! Provider selection.
//!
//! The provider is picked once from configuration and turned into a
//! [`SharedBackend`]; nothing downstream branches on it again.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::anthropic::{AnthropicBackend, AnthropicConfig};
use crate::backend::SharedBackend;
use crate::deepseek::DeepSeekBackend;
use crate::error::{LlmError, Result};
use crate::openai::{OpenAiBackend, OpenAiConfig};

// ─────────────────────────────────────────────────────────────────────────────
// Provider Enum
// ─────────────────────────────────────────────────────────────────────────────

/// Supported LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    /// OpenAI chat completions
    OpenAi,
    /// Anthropic Messages API
    Anthropic,
    /// DeepSeek (OpenAI-compatible wire format)
    DeepSeek,
}

impl Provider {
    /// Get the string name for this provider.
    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::DeepSeek => "deepseek",
        }
    }

    /// Parse a provider name by prefix, so `openai-azure` or `Claude` work.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        if name.starts_with("openai") || name.starts_with("gpt") {
            Some(Provider::OpenAi)
        } else if name.starts_with("anthropic") || name.starts_with("claude") {
            Some(Provider::Anthropic)
        } else if name.starts_with("deepseek") {
            Some(Provider::DeepSeek)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Provider {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s).ok_or_else(|| LlmError::Config(format!("Unknown LLM provider: {s}")))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Factory
// ─────────────────────────────────────────────────────────────────────────────

/// Everything needed to construct a backend.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub provider: Provider,
    pub api_key: String,
    /// Override of the provider's default endpoint.
    pub base_url: Option<String>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub max_retries: u32,
}

impl BackendSettings {
    pub fn new(provider: Provider, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            base_url: None,
            timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(10),
            max_retries: 3,
        }
    }
}

/// Build the configured backend.
pub fn build_backend(settings: &BackendSettings) -> Result<SharedBackend> {
    if settings.api_key.trim().is_empty() {
        return Err(LlmError::Config(format!(
            "No API key configured for {}",
            settings.provider
        )));
    }

    let backend: SharedBackend = match settings.provider {
        Provider::OpenAi => {
            let mut config = OpenAiConfig::openai(&settings.api_key);
            if let Some(url) = &settings.base_url {
                config = config.with_base_url(url);
            }
            Arc::new(OpenAiBackend::new(
                config
                    .with_timeout(settings.timeout)
                    .with_connect_timeout(settings.connect_timeout)
                    .with_max_retries(settings.max_retries),
            )?)
        }
        Provider::DeepSeek => {
            let mut config = DeepSeekBackend::config(&settings.api_key);
            if let Some(url) = &settings.base_url {
                config = config.with_base_url(url);
            }
            Arc::new(DeepSeekBackend::new(
                config
                    .with_timeout(settings.timeout)
                    .with_connect_timeout(settings.connect_timeout)
                    .with_max_retries(settings.max_retries),
            )?)
        }
        Provider::Anthropic => {
            let mut config = AnthropicConfig::new(&settings.api_key);
            if let Some(url) = &settings.base_url {
                config = config.with_base_url(url);
            }
            Arc::new(AnthropicBackend::new(
                config
                    .with_timeout(settings.timeout)
                    .with_connect_timeout(settings.connect_timeout)
                    .with_max_retries(settings.max_retries),
            )?)
        }
    };

    tracing::info!(provider = %settings.provider, backend = backend.name(), "LLM backend ready");
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_name() {
        assert_eq!(Provider::OpenAi.name(), "openai");
        assert_eq!(Provider::Anthropic.name(), "anthropic");
        assert_eq!(Provider::DeepSeek.to_string(), "deepseek");
    }

    #[test]
    fn test_provider_from_name_prefix() {
        assert_eq!(Provider::from_name("openai"), Some(Provider::OpenAi));
        assert_eq!(Provider::from_name("OpenAI-compatible"), Some(Provider::OpenAi));
        assert_eq!(Provider::from_name("anthropic"), Some(Provider::Anthropic));
        assert_eq!(Provider::from_name("claude"), Some(Provider::Anthropic));
        assert_eq!(Provider::from_name(" deepseek-chat "), Some(Provider::DeepSeek));
        assert_eq!(Provider::from_name("ollama"), None);
        assert!("mistral".parse::<Provider>().is_err());
    }

    #[test]
    fn test_build_backend_per_provider() {
        for (provider, expected) in [
            (Provider::OpenAi, "openai"),
            (Provider::Anthropic, "anthropic"),
            (Provider::DeepSeek, "deepseek"),
        ] {
            let backend = build_backend(&BackendSettings::new(provider, "key")).unwrap();
            assert_eq!(backend.name(), expected);
            assert_eq!(backend.declared_tools().len(), 3);
        }
    }

    #[test]
    fn test_build_backend_requires_key() {
        let result = build_backend(&BackendSettings::new(Provider::OpenAi, "  "));
        assert!(matches!(result, Err(LlmError::Config(_))));
    }
}
