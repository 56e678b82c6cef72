//! Conversation core for ChatPilot.
//!
//! This crate turns a question into a stream of answer events while letting
//! the model call tools mid-stream.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ChatOrchestrator                                           │
//! │  - Builds the system prompt from corpus + file metadata     │
//! │  - Streams the model, reassembles tool-call fragments       │
//! │  - Dispatches one tool, streams the follow-up turn          │
//! │  - Persists every message in conversation order             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!        ┌─────────────┬───────┴───────┬──────────────┐
//!        ▼             ▼               ▼              ▼
//!  ┌───────────┐ ┌───────────┐ ┌──────────────┐ ┌───────────┐
//!  │ LlmBackend│ │HistoryStore│ │ToolDispatcher│ │ Corpus /  │
//!  │           │ │           │ │ search/fetch/ │ │ Files     │
//!  │           │ │           │ │ AnalysisLoop  │ │           │
//!  └───────────┘ └───────────┘ └──────────────┘ └───────────┘
//! ```
//!
//! # Core Components
//!
//! - [`ChatOrchestrator`]: the per-request state machine
//! - [`ToolCallAccumulator`]: fragment reassembly
//! - [`trim_conversation`]: bounded, valid history windows
//! - [`AnalysisLoop`]: generate, execute, repair

pub mod accumulator;
pub mod analysis;
pub mod context;
pub mod conversation;
pub mod error;
pub mod orchestrator;
pub mod prompt;
pub mod tool;
pub mod tools;
pub mod types;

pub use accumulator::{DEFAULT_CALL_ID, ToolCallAccumulator};
pub use analysis::{
    AnalysisAttempt, AnalysisLoop, AnalysisOutcome, CodeExecutor, CodeGenerator, LlmCodeGenerator,
    strip_code_fence,
};
pub use context::{CorpusRetriever, EmptyCorpus, StaticCorpus};
pub use conversation::trim_conversation;
pub use error::{AgentError, Result};
pub use orchestrator::{
    ChatConfig, ChatOrchestrator, ChatOrchestratorBuilder, ChatStream, SEARCHING_STATUS,
};
pub use tool::{FileAnalyzer, ToolDispatcher, WebFetch, WebSearch};
pub use types::{ChatEvent, ChatRequest, FileMetadata, FileMetadataMap, GENERIC_ERROR};
