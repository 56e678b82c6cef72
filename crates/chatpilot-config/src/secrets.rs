//! API key resolution.
//!
//! Resolution order:
//! 1. `LLM_API_KEY`
//! 2. The provider's conventional variable (`OPENAI_API_KEY`, ...)
//! 3. Config file (with warning)

use std::fmt;

use chatpilot_llm::Provider;

/// Provider-independent API key variable.
pub const API_KEY_ENV: &str = "LLM_API_KEY";

/// Result of API key resolution with provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSecret {
    pub value: String,
    pub source: SecretSource,
}

/// Where a secret was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    EnvVar(String),
    /// Config file (plaintext, not recommended).
    ConfigFile,
}

impl fmt::Display for SecretSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretSource::EnvVar(var) => write!(f, "env var {var}"),
            SecretSource::ConfigFile => write!(f, "config file (plaintext)"),
        }
    }
}

/// Conventional API key variable for a provider.
pub fn provider_env_var(provider: Provider) -> &'static str {
    match provider {
        Provider::OpenAi => "OPENAI_API_KEY",
        Provider::Anthropic => "ANTHROPIC_API_KEY",
        Provider::DeepSeek => "DEEPSEEK_API_KEY",
    }
}

/// Resolve an API key from the process environment, then the config file.
pub fn resolve_api_key(provider: Provider, config_value: Option<&str>) -> Option<ResolvedSecret> {
    resolve_api_key_with(provider, config_value, |name| std::env::var(name).ok())
}

/// Resolve an API key, reading variables through `lookup`.
pub fn resolve_api_key_with<F>(
    provider: Provider,
    config_value: Option<&str>,
    lookup: F,
) -> Option<ResolvedSecret>
where
    F: Fn(&str) -> Option<String>,
{
    for var in [API_KEY_ENV, provider_env_var(provider)] {
        if let Some(value) = lookup(var).filter(|v| !v.trim().is_empty()) {
            return Some(ResolvedSecret {
                value,
                source: SecretSource::EnvVar(var.to_string()),
            });
        }
    }

    config_value
        .filter(|v| !v.trim().is_empty())
        .map(|v| ResolvedSecret {
            value: v.to_string(),
            source: SecretSource::ConfigFile,
        })
}
