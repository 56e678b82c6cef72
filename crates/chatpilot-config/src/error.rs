//! Configuration error types.

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration loading and resolution.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// API key not found through any resolution method.
    #[error("API key not found for provider '{provider}'. Set {env_var} or llm.api_key")]
    ApiKeyNotFound { provider: String, env_var: String },

    /// Provider name that matches no known backend.
    #[error("unknown LLM provider '{0}' (expected openai, anthropic or deepseek)")]
    UnknownProvider(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}
