//! Error types for the agent crate.

use thiserror::Error;

/// Result type alias using the agent error type.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Error type for agent operations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// LLM backend error.
    #[error("LLM error: {0}")]
    Llm(#[from] chatpilot_llm::LlmError),

    /// Tool execution error.
    #[error("Tool error: {0}")]
    Tool(String),

    /// Invalid tool parameters.
    #[error("Invalid tool parameters: {0}")]
    InvalidToolParams(String),

    /// History store error.
    #[error("Session error: {0}")]
    Session(#[from] chatpilot_session::SessionError),

    /// Code generation or execution error inside the analysis loop.
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Corpus retrieval or file analysis failed.
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Create a tool error.
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::Tool(msg.into())
    }

    /// Create an analysis error.
    pub fn analysis(msg: impl Into<String>) -> Self {
        Self::Analysis(msg.into())
    }

    /// Create a collaborator error.
    pub fn collaborator(msg: impl Into<String>) -> Self {
        Self::Collaborator(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
