//! Tool collaborators and dispatch.
//!
//! The model can request three tools. Each is backed by a collaborator trait
//! so the orchestrator never depends on a concrete HTTP client or sandbox:
//!
//! | Tool | Collaborator | Argument |
//! |------|--------------|----------|
//! | `web_search` | [`WebSearch`] | `question` |
//! | `web_fetch` | [`WebFetch`] | `url` |
//! | `analyze_data` | [`AnalysisLoop`] | `TODO` |
//!
//! Dispatch never fails: collaborator errors and unknown names become
//! `Error: ...` text that flows back to the model as the tool result.

use std::sync::Arc;

use async_trait::async_trait;
use chatpilot_llm::{ANALYZE_DATA, ToolCall, WEB_FETCH, WEB_SEARCH};
use tracing::{info, warn};

use crate::analysis::AnalysisLoop;
use crate::error::{AgentError, Result};
use crate::types::FileMetadataMap;

// ─────────────────────────────────────────────────────────────────────────────
// Collaborator Traits
// ─────────────────────────────────────────────────────────────────────────────

/// Web search returning a plain-text digest.
///
/// Failures are reported inside the text; the result is always usable as a
/// tool message.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> String;
}

/// URL fetcher returning readable text.
#[async_trait]
pub trait WebFetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Uploaded-file inspection.
#[async_trait]
pub trait FileAnalyzer: Send + Sync {
    /// Metadata for each readable file, keyed by file name.
    async fn analyze(&self, paths: &[String]) -> Result<FileMetadataMap>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatcher
// ─────────────────────────────────────────────────────────────────────────────

/// Routes a reconstructed tool call to its collaborator.
#[derive(Clone)]
pub struct ToolDispatcher {
    web_search: Arc<dyn WebSearch>,
    web_fetch: Arc<dyn WebFetch>,
    analysis: Arc<AnalysisLoop>,
}

impl ToolDispatcher {
    pub fn new(
        web_search: Arc<dyn WebSearch>,
        web_fetch: Arc<dyn WebFetch>,
        analysis: Arc<AnalysisLoop>,
    ) -> Self {
        Self {
            web_search,
            web_fetch,
            analysis,
        }
    }

    /// Run `call` and return the text of its tool message.
    ///
    /// `question` is the user's original question, used when the model
    /// leaves the main argument out.
    pub async fn dispatch(
        &self,
        call: &ToolCall,
        question: &str,
        metadata: Option<&FileMetadataMap>,
    ) -> String {
        info!(tool = %call.name, call_id = %call.id, "Dispatching tool call");
        match self.try_dispatch(call, question, metadata).await {
            Ok(content) => content,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool call failed");
                format!("Error: {}", tool_error_message(&e))
            }
        }
    }

    async fn try_dispatch(
        &self,
        call: &ToolCall,
        question: &str,
        metadata: Option<&FileMetadataMap>,
    ) -> Result<String> {
        match call.name.as_str() {
            WEB_SEARCH => {
                let query = call
                    .string_argument("question")
                    .unwrap_or_else(|| question.to_string());
                Ok(self.web_search.search(&query).await)
            }
            WEB_FETCH => {
                let url = call.string_argument("url").ok_or_else(|| {
                    AgentError::InvalidToolParams("web_fetch requires a 'url'".to_string())
                })?;
                self.web_fetch.fetch(&url).await
            }
            ANALYZE_DATA => {
                let task = call
                    .string_argument("TODO")
                    .unwrap_or_else(|| question.to_string());
                Ok(self.analysis.run(&task, metadata).await.tool_content())
            }
            other => Err(AgentError::tool(format!("unknown tool '{other}'"))),
        }
    }
}

/// Strip the variant prefix so the model sees the underlying message.
fn tool_error_message(error: &AgentError) -> String {
    match error {
        AgentError::Tool(msg) | AgentError::InvalidToolParams(msg) => msg.clone(),
        other => other.to_string(),
    }
}
