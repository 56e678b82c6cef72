//! DeepSeek backend.
//!
//! DeepSeek speaks the OpenAI chat-completions protocol, but its tool-call
//! fragments are treated as id-less: each carries the name and an argument
//! piece, and reconstruction relies on arrival order alone.

use async_trait::async_trait;

use crate::backend::{ChunkStream, LlmBackend};
use crate::error::Result;
use crate::openai::{OpenAiBackend, OpenAiConfig};
use crate::tools::builtin_tools;
use crate::types::CompletionRequest;

/// Default DeepSeek API base URL.
pub const DEFAULT_DEEPSEEK_BASE: &str = "https://api.deepseek.com";

/// DeepSeek backend on top of the OpenAI wire implementation.
pub struct DeepSeekBackend {
    inner: OpenAiBackend,
}

impl DeepSeekBackend {
    /// Config preset for DeepSeek's endpoint.
    pub fn config(api_key: impl Into<String>) -> OpenAiConfig {
        OpenAiConfig::openai(api_key)
            .with_base_url(DEFAULT_DEEPSEEK_BASE)
            .with_name("deepseek")
    }

    pub fn new(config: OpenAiConfig) -> Result<Self> {
        Ok(Self {
            inner: OpenAiBackend::new(config)?,
        })
    }
}

#[async_trait]
impl LlmBackend for DeepSeekBackend {
    fn name(&self) -> &str {
        &self.inner.config().name
    }

    fn declared_tools(&self) -> Vec<serde_json::Value> {
        builtin_tools().iter().map(|t| t.to_function_schema()).collect()
    }

    async fn stream_response(&self, request: CompletionRequest) -> Result<ChunkStream> {
        self.inner.stream_chunks(request, false).await
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        self.inner.complete_text(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deepseek_preset() {
        let config = DeepSeekBackend::config("sk-test");
        assert_eq!(config.base_url, DEFAULT_DEEPSEEK_BASE);
        assert_eq!(config.name, "deepseek");

        let backend = DeepSeekBackend::new(config).unwrap();
        assert_eq!(backend.name(), "deepseek");
        assert_eq!(backend.declared_tools().len(), 3);
        assert_eq!(backend.declared_tools()[0]["type"], "function");
    }
}
