//! Anthropic Messages API backend.
//!
//! Tool calls arrive as a `content_block_start` carrying name and id,
//! followed by `input_json_delta` events with argument text only.

use async_trait::async_trait;
use reqwest::{Client, Response, header};
use std::time::Duration;

use crate::backend::{ChunkStream, LlmBackend, with_retry};
use crate::error::{ApiErrorBody, LlmError, Result};
use crate::sse::{Decoded, SseFrame, normalize_frames, sse_frames};
use crate::tools::builtin_tools;
use crate::types::{CompletionRequest, Message, NormalizedChunk};

/// Default API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.anthropic.com";

/// Default API version.
const DEFAULT_API_VERSION: &str = "2023-06-01";

/// Default timeout for requests.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default timeout for establishing a connection.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the Anthropic backend.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key for authentication.
    pub api_key: String,

    /// Base URL for the API.
    pub base_url: String,

    /// API version header.
    pub api_version: String,

    /// Request timeout.
    pub timeout: Duration,

    /// Connection timeout.
    pub connect_timeout: Duration,

    /// Maximum retries for transient errors.
    pub max_retries: u32,

    /// Initial backoff duration for retries.
    pub retry_backoff: Duration,
}

impl AnthropicConfig {
    /// Create a new config with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_API_BASE.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
        }
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
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
// Anthropic Backend
// ─────────────────────────────────────────────────────────────────────────────

/// Anthropic API backend.
pub struct AnthropicBackend {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicBackend {
    /// Create a new Anthropic backend with the given configuration.
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Build the messages endpoint URL.
    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }

    /// Add authentication and API headers to a request.
    fn add_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.api_version)
            .header(header::CONTENT_TYPE, "application/json")
    }

    /// Convert a request into a Messages API body.
    ///
    /// System messages inside the conversation are folded into the
    /// top-level `system` field, which is the only place the API accepts them.
    fn to_api_request(&self, request: &CompletionRequest, stream: bool) -> ApiRequest {
        let mut system: Vec<&str> = request.system.iter().map(String::as_str).collect();
        let mut messages = Vec::with_capacity(request.messages.len());

        for message in &request.messages {
            match message {
                Message::System { content } => system.push(content),
                Message::User { content } => messages.push(ApiMessage {
                    role: "user",
                    content: ApiContent::Text(content.clone()),
                }),
                Message::Assistant {
                    content,
                    tool_calls,
                } if !tool_calls.is_empty() => {
                    let mut blocks = Vec::with_capacity(tool_calls.len() + 1);
                    if !content.is_empty() {
                        blocks.push(ApiBlock::Text {
                            text: content.clone(),
                        });
                    }
                    blocks.extend(tool_calls.iter().map(|call| ApiBlock::ToolUse {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        input: serde_json::Value::Object(call.parsed_arguments()),
                    }));
                    messages.push(ApiMessage {
                        role: "assistant",
                        content: ApiContent::Blocks(blocks),
                    });
                }
                Message::Assistant { content, .. } => messages.push(ApiMessage {
                    role: "assistant",
                    content: ApiContent::Text(content.clone()),
                }),
                Message::Tool {
                    tool_call_id,
                    content,
                    ..
                } => messages.push(ApiMessage {
                    role: "user",
                    content: ApiContent::Blocks(vec![ApiBlock::ToolResult {
                        tool_use_id: tool_call_id.clone(),
                        content: content.clone(),
                    }]),
                }),
            }
        }

        let system = system.join("\n\n");
        ApiRequest {
            model: request.model.clone(),
            max_tokens: request.sampling.max_tokens,
            temperature: request.sampling.temperature,
            system: (!system.is_empty()).then_some(system),
            messages,
            stream,
            tools: request.tools.then(|| self.declared_tools()),
        }
    }

    /// POST the body, retrying transient failures, and check the status.
    async fn send(&self, body: &ApiRequest) -> Result<Response> {
        with_retry(
            self.config.max_retries,
            self.config.retry_backoff,
            "anthropic",
            || async {
                let response = self
                    .add_headers(self.client.post(self.messages_url()))
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
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn declared_tools(&self) -> Vec<serde_json::Value> {
        builtin_tools().iter().map(|t| t.to_input_schema()).collect()
    }

    async fn stream_response(&self, request: CompletionRequest) -> Result<ChunkStream> {
        let body = self.to_api_request(&request, true);

        tracing::debug!(
            backend = "anthropic",
            model = %body.model,
            messages = body.messages.len(),
            "Opening messages stream"
        );

        let response = self.send(&body).await?;
        Ok(normalize_frames(sse_frames(response.bytes_stream()), decode_frame))
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let body = self.to_api_request(&request.with_tools(false), false);
        let response = self.send(&body).await?;
        let text = response.text().await?;
        let parsed: ApiResponse = serde_json::from_str(&text)?;

        Ok(parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                ApiResponseBlock::Text { text } => Some(text),
                ApiResponseBlock::Other => None,
            })
            .collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stream Decoding
// ─────────────────────────────────────────────────────────────────────────────

/// Decode one Messages API SSE frame.
fn decode_frame(frame: &SseFrame) -> Decoded {
    let event_type = match frame.event.as_deref() {
        Some(name) => name.to_string(),
        None => match serde_json::from_str::<EventType>(&frame.data) {
            Ok(t) => t.kind,
            Err(_) => return Decoded::Skip,
        },
    };

    match event_type.as_str() {
        "content_block_start" => match serde_json::from_str::<ContentBlockStartEvent>(&frame.data) {
            Ok(ContentBlockStartEvent {
                content_block: StartBlock::ToolUse { id, name },
            }) => Decoded::Chunks(vec![NormalizedChunk::call_start(name, id)]),
            Ok(_) => Decoded::Skip,
            Err(e) => skip_malformed(&event_type, e),
        },
        "content_block_delta" => match serde_json::from_str::<ContentBlockDeltaEvent>(&frame.data) {
            Ok(ContentBlockDeltaEvent { delta }) => match delta {
                DeltaContent::TextDelta { text } if !text.is_empty() => {
                    Decoded::Chunks(vec![NormalizedChunk::Delta { text }])
                }
                DeltaContent::InputJsonDelta { partial_json } if !partial_json.is_empty() => {
                    Decoded::Chunks(vec![NormalizedChunk::args(partial_json)])
                }
                // thinking and signature deltas are never forwarded
                _ => Decoded::Skip,
            },
            Err(e) => skip_malformed(&event_type, e),
        },
        "message_stop" => Decoded::Done,
        "error" => {
            let message = serde_json::from_str::<StreamErrorEvent>(&frame.data)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| "Unknown streaming error".to_string());
            tracing::warn!(error = %message, "Anthropic stream reported an error");
            Decoded::Done
        }
        _ => Decoded::Skip,
    }
}

fn skip_malformed(event_type: &str, error: serde_json::Error) -> Decoded {
    tracing::debug!(event_type, error = %error, "Skipping undecodable stream event");
    Decoded::Skip
}

// ─────────────────────────────────────────────────────────────────────────────
// API Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, serde::Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, serde::Serialize)]
struct ApiMessage {
    role: &'static str,
    content: ApiContent,
}

#[derive(Debug, serde::Serialize)]
#[serde(untagged)]
enum ApiContent {
    Text(String),
    Blocks(Vec<ApiBlock>),
}

#[derive(Debug, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Debug, serde::Deserialize)]
struct ApiResponse {
    #[serde(default)]
    content: Vec<ApiResponseBlock>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiResponseBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, serde::Deserialize)]
struct EventType {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, serde::Deserialize)]
struct ContentBlockStartEvent {
    content_block: StartBlock,
}

#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StartBlock {
    ToolUse {
        id: String,
        name: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, serde::Deserialize)]
struct ContentBlockDeltaEvent {
    delta: DeltaContent,
}

#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum DeltaContent {
    TextDelta {
        text: String,
    },
    InputJsonDelta {
        partial_json: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, serde::Deserialize)]
struct StreamErrorEvent {
    error: ApiErrorBody,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
