//! The history store abstraction.

use std::sync::Arc;

use async_trait::async_trait;
use chatpilot_llm::Message;

use crate::error::Result;

/// Ordered, append-only message lists keyed by session id.
///
/// Each call is atomic on its own; there are no multi-call transactions.
/// Reading twice without an intervening append returns the same list.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// All messages of `session_id` in append order; empty for unknown ids.
    async fn get_messages(&self, session_id: &str) -> Result<Vec<Message>>;

    /// Append one message to `session_id`, creating the session if needed.
    async fn add_message(&self, session_id: &str, message: Message) -> Result<()>;
}

/// A store that can be shared across request tasks.
pub type SharedHistoryStore = Arc<dyn HistoryStore>;
