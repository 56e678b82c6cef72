//! Conversation and streaming types shared by every provider.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─────────────────────────────────────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────────────────────────────────────

/// Role of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-issued call identifier.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Serialized JSON arguments exactly as the model produced them.
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Arguments parsed as a JSON object.
    ///
    /// Best effort: anything that is not a JSON object yields an empty map.
    pub fn parsed_arguments(&self) -> Map<String, Value> {
        match serde_json::from_str::<Value>(&self.arguments) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => Map::new(),
        }
    }

    /// A string argument, if present and non-blank.
    pub fn string_argument(&self, key: &str) -> Option<String> {
        self.parsed_arguments()
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

/// One conversation message.
///
/// A `Tool` message answers exactly one earlier assistant [`ToolCall`] by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        name: String,
        content: String,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// An assistant turn with empty content that only requests `call`.
    pub fn assistant_tool_call(call: ToolCall) -> Self {
        Message::Assistant {
            content: String::new(),
            tool_calls: vec![call],
        }
    }

    pub fn tool(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Message::Tool {
            tool_call_id: tool_call_id.into(),
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Message::System { .. } => Role::System,
            Message::User { .. } => Role::User,
            Message::Assistant { .. } => Role::Assistant,
            Message::Tool { .. } => Role::Tool,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Message::System { content }
            | Message::User { content }
            | Message::Assistant { content, .. }
            | Message::Tool { content, .. } => content,
        }
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Message::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    pub fn is_tool(&self) -> bool {
        matches!(self, Message::Tool { .. })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────────────────────────

/// Sampling parameters forwarded to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 1.0,
            max_tokens: 1024,
        }
    }
}

/// Everything a provider needs for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    /// Fully rendered system prompt.
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub sampling: SamplingParams,
    /// Advertise the built-in tools to the provider.
    pub tools: bool,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            system: None,
            messages,
            sampling: SamplingParams::default(),
            tools: false,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_tools(mut self, enabled: bool) -> Self {
        self.tools = enabled;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Normalized Chunks
// ─────────────────────────────────────────────────────────────────────────────

/// The unit every provider stream is decoded into.
///
/// A tool call arrives as one or more `ToolCallFragment`s whose
/// `args_fragment`s concatenate, in arrival order, to the full JSON argument
/// string. Some providers put name and id on a leading fragment only; others
/// repeat the name and never send an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedChunk {
    /// Partial answer text.
    Delta { text: String },
    /// Partial encoding of a tool call.
    ToolCallFragment {
        name: Option<String>,
        call_id: Option<String>,
        args_fragment: Option<String>,
    },
    /// Terminal marker, exactly one per stream.
    End,
}

impl NormalizedChunk {
    pub fn delta(text: impl Into<String>) -> Self {
        NormalizedChunk::Delta { text: text.into() }
    }

    /// A fragment carrying only argument text.
    pub fn args(fragment: impl Into<String>) -> Self {
        NormalizedChunk::ToolCallFragment {
            name: None,
            call_id: None,
            args_fragment: Some(fragment.into()),
        }
    }

    /// A fragment opening a call with a name and id.
    pub fn call_start(name: impl Into<String>, call_id: impl Into<String>) -> Self {
        NormalizedChunk::ToolCallFragment {
            name: Some(name.into()),
            call_id: Some(call_id.into()),
            args_fragment: None,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, NormalizedChunk::End)
    }
}
