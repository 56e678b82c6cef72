//! OpenAI chat-completions backend.
//!
//! Also the wire implementation behind [`crate::deepseek`], which speaks the
//! same protocol.

use async_trait::async_trait;
use reqwest::{Client, Response, header};
use std::time::Duration;

use crate::backend::{ChunkStream, LlmBackend, with_retry};
use crate::error::{LlmError, Result};
use crate::sse::{Decoded, SseFrame, normalize_frames, sse_frames};
use crate::tools::builtin_tools;
use crate::types::{CompletionRequest, Message, NormalizedChunk};

/// Default OpenAI API base URL.
pub const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com/v1";

/// Default total timeout for a request, streaming body included.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default timeout for establishing a connection.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for an OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key sent as a bearer token.
    pub api_key: Option<String>,

    /// Base URL for the API.
    pub base_url: String,

    /// Total request timeout.
    pub timeout: Duration,

    /// Connection timeout.
    pub connect_timeout: Duration,

    /// Maximum retries for transient errors.
    pub max_retries: u32,

    /// Initial backoff duration for retries.
    pub retry_backoff: Duration,

    /// Name for this backend instance.
    pub name: String,
}

impl OpenAiConfig {
    /// Create a new config for OpenAI.
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            base_url: DEFAULT_OPENAI_BASE.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
            name: "openai".to_string(),
        }
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the backend name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set max retries.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OpenAI Backend
// ─────────────────────────────────────────────────────────────────────────────

/// OpenAI-compatible API backend.
pub struct OpenAiBackend {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiBackend {
    /// Create a new OpenAI-compatible backend with the given configuration.
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    /// Build the chat completions endpoint URL.
    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// Add authentication headers to a request.
    fn add_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.header(header::CONTENT_TYPE, "application/json");

        if let Some(ref api_key) = self.config.api_key {
            builder.header(header::AUTHORIZATION, format!("Bearer {}", api_key))
        } else {
            builder
        }
    }

    /// Convert a request into the chat-completions body.
    fn to_openai_request(&self, request: &CompletionRequest, stream: bool) -> OpenAiChatRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);

        if let Some(ref system) = request.system {
            messages.push(OpenAiMessage::text("system", system));
        }
        messages.extend(request.messages.iter().map(OpenAiMessage::from));

        let tools = if request.tools {
            Some(builtin_tools().iter().map(|t| t.to_function_schema()).collect())
        } else {
            None
        };

        OpenAiChatRequest {
            model: request.model.clone(),
            messages,
            max_tokens: request.sampling.max_tokens,
            temperature: request.sampling.temperature,
            top_p: request.sampling.top_p,
            stream,
            tools,
        }
    }

    /// POST the body, retrying transient failures, and check the status.
    async fn send(&self, body: &OpenAiChatRequest) -> Result<Response> {
        with_retry(
            self.config.max_retries,
            self.config.retry_backoff,
            &self.config.name,
            || async {
                let response = self
                    .add_headers(self.client.post(self.completions_url()))
                    .json(body)
                    .send()
                    .await?;

                if !response.status().is_success() {
                    return Err(LlmError::from_response(response).await);
                }
                Ok(response)
            },
        )
        .await
    }

    /// Open a stream and normalize it, optionally dropping call ids.
    pub(crate) async fn stream_chunks(
        &self,
        request: CompletionRequest,
        include_call_ids: bool,
    ) -> Result<ChunkStream> {
        let body = self.to_openai_request(&request, true);

        tracing::debug!(
            backend = %self.config.name,
            model = %body.model,
            messages = body.messages.len(),
            tools = body.tools.as_ref().map(|t| t.len()).unwrap_or(0),
            "Opening chat completions stream"
        );

        let response = self.send(&body).await?;
        let frames = sse_frames(response.bytes_stream());
        Ok(normalize_frames(frames, move |frame| {
            decode_frame(frame, include_call_ids)
        }))
    }

    pub(crate) async fn complete_text(&self, request: CompletionRequest) -> Result<String> {
        let body = self.to_openai_request(&request.with_tools(false), false);
        let response = self.send(&body).await?;
        let text = response.text().await?;
        let parsed: OpenAiChatResponse = serde_json::from_str(&text)?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn declared_tools(&self) -> Vec<serde_json::Value> {
        builtin_tools().iter().map(|t| t.to_function_schema()).collect()
    }

    async fn stream_response(&self, request: CompletionRequest) -> Result<ChunkStream> {
        self.stream_chunks(request, true).await
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        self.complete_text(request).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stream Decoding
// ─────────────────────────────────────────────────────────────────────────────

/// Decode one chat-completions SSE frame.
pub(crate) fn decode_frame(frame: &SseFrame, include_call_ids: bool) -> Decoded {
    let data = frame.data.trim();
    if data == "[DONE]" {
        return Decoded::Done;
    }

    let chunk = match serde_json::from_str::<OpenAiStreamChunk>(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            tracing::debug!(error = %e, "Skipping undecodable stream event");
            return Decoded::Skip;
        }
    };

    let mut out = Vec::new();
    for delta in chunk.choices.into_iter().filter_map(|c| c.delta) {
        if let Some(text) = delta.content.filter(|t| !t.is_empty()) {
            out.push(NormalizedChunk::Delta { text });
        }

        for call in delta.tool_calls.unwrap_or_default() {
            let (name, args_fragment) = match call.function {
                Some(f) => (non_empty(f.name), non_empty(f.arguments)),
                None => (None, None),
            };
            let call_id = if include_call_ids { non_empty(call.id) } else { None };

            if name.is_some() || call_id.is_some() || args_fragment.is_some() {
                out.push(NormalizedChunk::ToolCallFragment {
                    name,
                    call_id,
                    args_fragment,
                });
            }
        }
    }

    if out.is_empty() {
        Decoded::Skip
    } else {
        Decoded::Chunks(out)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

// ─────────────────────────────────────────────────────────────────────────────
// OpenAI API Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, serde::Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, serde::Serialize)]
struct OpenAiMessage {
    role: &'static str,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl OpenAiMessage {
    fn text(role: &'static str, content: &str) -> Self {
        Self {
            role,
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }
}

impl From<&Message> for OpenAiMessage {
    fn from(message: &Message) -> Self {
        match message {
            Message::System { content } => Self::text("system", content),
            Message::User { content } => Self::text("user", content),
            Message::Assistant {
                content,
                tool_calls,
            } if !tool_calls.is_empty() => Self {
                role: "assistant",
                content: (!content.is_empty()).then(|| content.clone()),
                tool_calls: Some(
                    tool_calls
                        .iter()
                        .map(|call| OpenAiToolCall {
                            id: call.id.clone(),
                            call_type: "function",
                            function: OpenAiFunctionCall {
                                name: call.name.clone(),
                                arguments: call.arguments.clone(),
                            },
                        })
                        .collect(),
                ),
                tool_call_id: None,
                name: None,
            },
            Message::Assistant { content, .. } => Self::text("assistant", content),
            Message::Tool {
                tool_call_id,
                name,
                content,
            } => Self {
                role: "tool",
                content: Some(content.clone()),
                tool_calls: None,
                tool_call_id: Some(tool_call_id.clone()),
                name: Some(name.clone()),
            },
        }
    }
}

#[derive(Debug, serde::Serialize)]
struct OpenAiToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: &'static str,
    function: OpenAiFunctionCall,
}

#[derive(Debug, serde::Serialize)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiChatResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiStreamChoice {
    delta: Option<OpenAiStreamDelta>,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiStreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiStreamToolCall>>,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiStreamToolCall {
    id: Option<String>,
    function: Option<OpenAiStreamFunction>,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiStreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
