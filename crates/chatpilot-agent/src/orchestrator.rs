//! The per-request conversation state machine.
//!
//! ```text
//! AwaitingFirstTurn ─► Streaming ─┬────────────────────────────────► Finalizing ─► Done
//!                                 └► ToolDetected ─► ToolExecuting ─► FollowupStreaming ─┘
//! ```
//!
//! [`ChatOrchestrator::handle_request`] drives one pass and yields
//! [`ChatEvent`]s. Every message is persisted as soon as it exists, so the
//! history order is always user, assistant tool call, tool result, final
//! assistant answer. Whatever goes wrong, the stream ends with exactly one
//! terminal event.

use std::pin::Pin;
use std::sync::Arc;

use chatpilot_llm::{
    CompletionRequest, Message, NormalizedChunk, SamplingParams, SharedBackend, ToolCall,
};
use chatpilot_session::{HistoryStore, InMemoryHistoryStore, SharedHistoryStore};
use futures::{Stream, StreamExt};
use tracing::{debug, error, info, warn};

use crate::accumulator::ToolCallAccumulator;
use crate::analysis::{
    AnalysisLoop, CodeExecutor, CodeGenerator, DEFAULT_MAX_ATTEMPTS, LlmCodeGenerator,
};
use crate::context::{CorpusRetriever, EmptyCorpus};
use crate::conversation::trim_conversation;
use crate::error::{AgentError, Result};
use crate::prompt::{DEFAULT_SYSTEM_PROMPT, SystemPromptBuilder};
use crate::tool::{FileAnalyzer, ToolDispatcher, WebFetch, WebSearch};
use crate::tools::{DisabledWebSearch, HttpWebFetcher, TabularFileAnalyzer, WebFetchConfig};
use crate::types::{ChatEvent, ChatRequest, FileMetadataMap};

/// Status shown while corpus retrieval runs.
pub const SEARCHING_STATUS: &str = "Searching knowledge base...";

/// The caller-visible event stream.
pub type ChatStream = Pin<Box<dyn Stream<Item = ChatEvent> + Send + 'static>>;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Model and conversation settings for the orchestrator.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub model: String,
    pub sampling: SamplingParams,
    /// Messages kept in the model's view; `0` keeps everything.
    pub max_conversation_turns: usize,
    /// System prompt template with a `{context}` placeholder.
    pub system_prompt: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            sampling: SamplingParams::default(),
            max_conversation_turns: 20,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ─────────────────────────────────────────────────────────────────────────────

/// Handles chat turns. Safe to share across concurrent requests.
pub struct ChatOrchestrator {
    backend: SharedBackend,
    history: SharedHistoryStore,
    corpus: Arc<dyn CorpusRetriever>,
    files: Arc<dyn FileAnalyzer>,
    tools: ToolDispatcher,
    config: ChatConfig,
}

impl ChatOrchestrator {
    pub fn builder() -> ChatOrchestratorBuilder {
        ChatOrchestratorBuilder::new()
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn history(&self) -> &SharedHistoryStore {
        &self.history
    }

    /// Answer one question as a stream of events.
    ///
    /// The stream always ends with [`ChatEvent::End`] or a single
    /// [`ChatEvent::Error`]. Dropping it abandons generation; messages
    /// already persisted stay persisted.
    pub fn handle_request(self: &Arc<Self>, request: ChatRequest) -> ChatStream {
        let this = Arc::clone(self);

        Box::pin(async_stream::stream! {
            let session_id = request.session_id.as_str();
            let question = request.question.as_str();
            info!(session_id = %session_id, files = request.files.len(), "Chat request");

            // 1. Prior conversation.
            let mut messages = match this.history.get_messages(session_id).await {
                Ok(m) => m,
                Err(e) => {
                    error!(session_id = %session_id, error = %e, "Failed to load history");
                    yield ChatEvent::error();
                    return;
                }
            };

            // 2. Uploaded file metadata, best effort.
            let metadata = this.analyze_files(&request.files).await;

            // 3. Corpus context, best effort.
            yield ChatEvent::status(SEARCHING_STATUS);
            let context = this.retrieve_context(question).await;

            // 4. System prompt.
            let system = SystemPromptBuilder::new(&this.config.system_prompt)
                .with_context(&context)
                .with_file_metadata(metadata.as_ref())
                .build();

            // 5. Persist the question before any model call.
            let user = Message::user(question);
            messages.push(user.clone());
            if let Err(e) = this.history.add_message(session_id, user).await {
                error!(session_id = %session_id, error = %e, "Failed to persist user message");
                yield ChatEvent::error();
                return;
            }

            // 6. First model turn.
            messages = trim_conversation(messages, this.config.max_conversation_turns);
            let mut stream = match this.backend.stream_response(this.completion_request(&system, &messages)).await {
                Ok(s) => s,
                Err(e) => {
                    error!(session_id = %session_id, backend = this.backend.name(), error = %e, "Failed to start response stream");
                    yield ChatEvent::error();
                    return;
                }
            };

            // 7. Forward text, collect tool-call fragments.
            let mut response = String::new();
            let mut calls = ToolCallAccumulator::new();
            while let Some(chunk) = stream.next().await {
                match chunk {
                    NormalizedChunk::Delta { text } => {
                        if !text.is_empty() {
                            response.push_str(&text);
                            yield ChatEvent::Content(text);
                        }
                    }
                    NormalizedChunk::End => break,
                    fragment => {
                        calls.push_chunk(&fragment);
                    }
                }
            }
            drop(stream);

            // 8-10. At most one tool per turn.
            if let Some(call) = calls.first() {
                if calls.len() > 1 {
                    warn!(
                        session_id = %session_id,
                        calls = calls.len(),
                        tool = %call.name,
                        "Model requested several tool calls; dispatching only the first"
                    );
                }

                let assistant = Message::assistant_tool_call(call.clone());
                messages.push(assistant.clone());
                if let Err(e) = this.history.add_message(session_id, assistant).await {
                    error!(session_id = %session_id, error = %e, "Failed to persist tool call");
                    yield ChatEvent::error();
                    return;
                }

                let content = this.tools.dispatch(&call, question, metadata.as_ref()).await;
                let tool_message = Message::tool(&call.id, &call.name, content);
                messages.push(tool_message.clone());
                if let Err(e) = this.history.add_message(session_id, tool_message).await {
                    error!(session_id = %session_id, error = %e, "Failed to persist tool result");
                    yield ChatEvent::error();
                    return;
                }

                messages = trim_conversation(messages, this.config.max_conversation_turns);
                let followup_system = SystemPromptBuilder::new(&this.config.system_prompt).build();
                match this.backend.stream_response(this.completion_request(&followup_system, &messages)).await {
                    Ok(mut followup) => {
                        while let Some(chunk) = followup.next().await {
                            match chunk {
                                NormalizedChunk::Delta { text } => {
                                    if !text.is_empty() {
                                        response.push_str(&text);
                                        yield ChatEvent::Content(text);
                                    }
                                }
                                NormalizedChunk::End => break,
                                NormalizedChunk::ToolCallFragment { .. } => {
                                    debug!(session_id = %session_id, "Ignoring tool call in follow-up turn");
                                }
                            }
                        }
                    }
                    Err(e) => {
                        warn!(session_id = %session_id, error = %e, "Follow-up stream failed to start");
                    }
                }
            }

            // 11. Final answer.
            if !response.is_empty() {
                if let Err(e) = this.history.add_message(session_id, Message::assistant(response.as_str())).await {
                    error!(session_id = %session_id, error = %e, "Failed to persist answer");
                    yield ChatEvent::error();
                    return;
                }
            }

            // 12.
            info!(session_id = %session_id, chars = response.len(), "Response complete");
            yield ChatEvent::End;
        })
    }

    fn completion_request(&self, system: &str, messages: &[Message]) -> CompletionRequest {
        CompletionRequest::new(&self.config.model, messages.to_vec())
            .with_system(system)
            .with_sampling(self.config.sampling)
            .with_tools(true)
    }

    async fn analyze_files(&self, files: &[String]) -> Option<FileMetadataMap> {
        if files.is_empty() {
            return None;
        }
        match self.files.analyze(files).await {
            Ok(metadata) if !metadata.is_empty() => Some(metadata),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "File analysis failed, continuing without metadata");
                None
            }
        }
    }

    async fn retrieve_context(&self, question: &str) -> Vec<String> {
        match self.corpus.retrieve(question).await {
            Ok(chunks) => {
                debug!(chunks = chunks.len(), "Retrieved corpus context");
                chunks
            }
            Err(e) => {
                warn!(error = %e, "Corpus retrieval failed, continuing without context");
                Vec::new()
            }
        }
    }

    /// Dispatch a single tool call outside a chat turn.
    pub async fn run_tool(&self, call: &ToolCall, question: &str) -> String {
        self.tools.dispatch(call, question, None).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for [`ChatOrchestrator`].
///
/// Only the backend and a code executor are required. Everything else has a
/// working default: in-memory history, empty corpus, CSV/Excel analysis, disabled
/// web search, HTTP fetching, and code generation on the chat backend.
pub struct ChatOrchestratorBuilder {
    backend: Option<SharedBackend>,
    history: Option<SharedHistoryStore>,
    corpus: Arc<dyn CorpusRetriever>,
    files: Arc<dyn FileAnalyzer>,
    web_search: Arc<dyn WebSearch>,
    web_fetch: Option<Arc<dyn WebFetch>>,
    code_generator: Option<Arc<dyn CodeGenerator>>,
    code_executor: Option<Arc<dyn CodeExecutor>>,
    max_analysis_attempts: u32,
    config: ChatConfig,
}

impl ChatOrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            backend: None,
            history: None,
            corpus: Arc::new(EmptyCorpus),
            files: Arc::new(TabularFileAnalyzer),
            web_search: Arc::new(DisabledWebSearch),
            web_fetch: None,
            code_generator: None,
            code_executor: None,
            max_analysis_attempts: DEFAULT_MAX_ATTEMPTS,
            config: ChatConfig::default(),
        }
    }

    pub fn with_backend(mut self, backend: SharedBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_history(mut self, history: SharedHistoryStore) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_corpus(mut self, corpus: Arc<dyn CorpusRetriever>) -> Self {
        self.corpus = corpus;
        self
    }

    pub fn with_file_analyzer(mut self, files: Arc<dyn FileAnalyzer>) -> Self {
        self.files = files;
        self
    }

    pub fn with_web_search(mut self, search: Arc<dyn WebSearch>) -> Self {
        self.web_search = search;
        self
    }

    pub fn with_web_fetch(mut self, fetch: Arc<dyn WebFetch>) -> Self {
        self.web_fetch = Some(fetch);
        self
    }

    /// Override the code generator (defaults to the chat backend).
    pub fn with_code_generator(mut self, generator: Arc<dyn CodeGenerator>) -> Self {
        self.code_generator = Some(generator);
        self
    }

    pub fn with_code_executor(mut self, executor: Arc<dyn CodeExecutor>) -> Self {
        self.code_executor = Some(executor);
        self
    }

    pub fn with_max_analysis_attempts(mut self, attempts: u32) -> Self {
        self.max_analysis_attempts = attempts;
        self
    }

    pub fn with_config(mut self, config: ChatConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<ChatOrchestrator> {
        let backend = self
            .backend
            .ok_or_else(|| AgentError::internal("LLM backend is required"))?;
        let executor = self
            .code_executor
            .ok_or_else(|| AgentError::internal("Code executor is required"))?;

        let generator = match self.code_generator {
            Some(generator) => generator,
            None => Arc::new(
                LlmCodeGenerator::new(backend.clone(), &self.config.model)
                    .with_sampling(self.config.sampling),
            ),
        };
        let analysis = AnalysisLoop::new(generator, executor)
            .with_max_attempts(self.max_analysis_attempts);

        let web_fetch = match self.web_fetch {
            Some(fetch) => fetch,
            None => Arc::new(HttpWebFetcher::new(WebFetchConfig::default())?),
        };
        let history = self
            .history
            .unwrap_or_else(|| Arc::new(InMemoryHistoryStore::default()));

        Ok(ChatOrchestrator {
            backend,
            history,
            corpus: self.corpus,
            files: self.files,
            tools: ToolDispatcher::new(self.web_search, web_fetch, Arc::new(analysis)),
            config: self.config,
        })
    }
}

impl Default for ChatOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
