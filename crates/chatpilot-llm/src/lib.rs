//! Provider-neutral streaming LLM access for ChatPilot.
//!
//! Every provider's native streaming protocol is decoded into one chunk
//! model, [`NormalizedChunk`], so the conversation layer never sees wire
//! formats.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  LlmBackend trait                           │
//! │  - stream_response() -> Stream<Chunk>       │
//! │  - complete()        -> String              │
//! │  - declared_tools()  -> provider schema     │
//! └─────────────────────────────────────────────┘
//!                    │
//!     ┌──────────────┼──────────────┐
//!     ▼              ▼              ▼
//! ┌────────┐   ┌──────────┐   ┌──────────┐
//! │ OpenAI │   │Anthropic │   │ DeepSeek │
//! └────────┘   └──────────┘   └──────────┘
//!     └──────── SSE frame decoder ───┘
//! ```
//!
//! Streams are finite, single-pass and always end with exactly one
//! [`NormalizedChunk::End`]. Events that fail to decode are skipped.

pub mod backend;
pub mod error;
pub mod provider;
pub mod tools;
pub mod types;

mod sse;

// Provider implementations
pub mod anthropic;
pub mod deepseek;
pub mod openai;

pub use backend::{ChunkStream, LlmBackend, SharedBackend, terminated, with_retry};
pub use error::{LlmError, RateLimitInfo, Result};
pub use provider::{BackendSettings, Provider, build_backend};
pub use tools::{ANALYZE_DATA, ToolDefinition, WEB_FETCH, WEB_SEARCH, builtin_tools};
pub use types::{CompletionRequest, Message, NormalizedChunk, Role, SamplingParams, ToolCall};

pub use anthropic::{AnthropicBackend, AnthropicConfig};
pub use deepseek::DeepSeekBackend;
pub use openai::{OpenAiBackend, OpenAiConfig};

#[cfg(any(test, feature = "testing"))]
pub use backend::{MockBackend, MockTurn};
