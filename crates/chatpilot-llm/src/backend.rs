//! LLM Backend trait and shared helpers.
//!
//! This module defines the capability every provider adapter offers and a
//! scripted mock for tests.

use async_trait::async_trait;
use futures::{Stream, StreamExt, future, stream};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{LlmError, Result};
use crate::types::{CompletionRequest, NormalizedChunk};

// ─────────────────────────────────────────────────────────────────────────────
// Shared Retry Logic
// ─────────────────────────────────────────────────────────────────────────────

/// Execute an async operation with exponential backoff retry.
///
/// Retries only on transient errors (network failures, rate limits).
/// Non-retryable errors are returned immediately. A provider-supplied
/// retry-after wins over the computed backoff.
pub async fn with_retry<F, Fut, T>(
    max_retries: u32,
    initial_backoff: Duration,
    backend_name: &str,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut backoff = initial_backoff;
    let mut attempt = 0;

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                attempt += 1;
                let wait = e.retry_after().unwrap_or(backoff);
                tracing::warn!(
                    backend = backend_name,
                    attempt,
                    max_retries,
                    backoff_ms = wait.as_millis() as u64,
                    error = %e,
                    "Request failed, retrying"
                );
                tokio::time::sleep(wait).await;
                backoff *= 2;
            }
            Err(e) => return Err(e),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Streaming Types
// ─────────────────────────────────────────────────────────────────────────────

/// A normalized chunk stream. Finite, single-pass, ends with one `End`.
pub type ChunkStream = Pin<Box<dyn Stream<Item = NormalizedChunk> + Send + 'static>>;

/// Cut `chunks` at its first `End` (if any) and append exactly one `End`.
pub fn terminated<S>(chunks: S) -> ChunkStream
where
    S: Stream<Item = NormalizedChunk> + Send + 'static,
{
    Box::pin(
        chunks
            .take_while(|chunk| future::ready(!chunk.is_end()))
            .chain(stream::once(future::ready(NormalizedChunk::End))),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// LLM Backend Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for LLM provider adapters.
///
/// The provider is chosen once at startup; everything downstream talks to a
/// [`SharedBackend`].
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Get the name of this backend.
    fn name(&self) -> &str;

    /// The built-in tools in this provider's function-calling syntax.
    fn declared_tools(&self) -> Vec<serde_json::Value>;

    /// Issue one streaming call and return its normalized chunks.
    ///
    /// Errors only when the call can't be established (connection, auth,
    /// HTTP status). Once streaming, decode failures skip the offending
    /// event and transport failures end the stream early; the stream always
    /// finishes with a single `End`.
    async fn stream_response(&self, request: CompletionRequest) -> Result<ChunkStream>;

    /// Issue one non-streaming call and return the text of the reply.
    ///
    /// Tools are never advertised. An empty reply is `Ok("")`.
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared Backend Type
// ─────────────────────────────────────────────────────────────────────────────

/// A backend that can be shared across threads.
pub type SharedBackend = Arc<dyn LlmBackend>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Backend
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(any(test, feature = "testing"))]
pub use mock::{MockBackend, MockTurn};

#[cfg(any(test, feature = "testing"))]
mod mock {
    use std::collections::VecDeque;

    use parking_lot::Mutex;

    use super::*;

    /// One scripted reply to `stream_response`.
    #[derive(Debug, Clone)]
    pub enum MockTurn {
        /// Stream these chunks (an `End` is appended if missing).
        Chunks(Vec<NormalizedChunk>),
        /// Fail to establish the stream.
        Fail(String),
    }

    /// A mock backend for testing purposes.
    ///
    /// Streaming turns and completions are scripted separately and consumed
    /// in order; every request is logged.
    #[derive(Debug, Default)]
    pub struct MockBackend {
        turns: Mutex<VecDeque<MockTurn>>,
        completions: Mutex<VecDeque<std::result::Result<String, String>>>,
        request_log: Mutex<Vec<CompletionRequest>>,
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a streaming turn.
        pub fn with_turn(self, chunks: Vec<NormalizedChunk>) -> Self {
            self.turns.lock().push_back(MockTurn::Chunks(chunks));
            self
        }

        /// Queue a streaming turn made of a single text delta.
        pub fn with_text_turn(self, text: impl Into<String>) -> Self {
            self.with_turn(vec![NormalizedChunk::delta(text)])
        }

        /// Queue a streaming turn that fails to connect.
        pub fn with_failed_turn(self, message: impl Into<String>) -> Self {
            self.turns.lock().push_back(MockTurn::Fail(message.into()));
            self
        }

        /// Queue a completion reply.
        pub fn with_completion(self, text: impl Into<String>) -> Self {
            self.completions.lock().push_back(Ok(text.into()));
            self
        }

        /// Queue a failing completion.
        pub fn with_failed_completion(self, message: impl Into<String>) -> Self {
            self.completions.lock().push_back(Err(message.into()));
            self
        }

        /// Get all requests that were made to this backend.
        pub fn requests(&self) -> Vec<CompletionRequest> {
            self.request_log.lock().clone()
        }

        /// Get the number of requests made.
        pub fn request_count(&self) -> usize {
            self.request_log.lock().len()
        }
    }

    #[async_trait]
    impl LlmBackend for MockBackend {
        fn name(&self) -> &str {
            "mock"
        }

        fn declared_tools(&self) -> Vec<serde_json::Value> {
            crate::tools::builtin_tools()
                .iter()
                .map(|t| t.to_function_schema())
                .collect()
        }

        async fn stream_response(&self, request: CompletionRequest) -> Result<ChunkStream> {
            self.request_log.lock().push(request);
            let turn = self.turns.lock().pop_front();
            match turn {
                Some(MockTurn::Chunks(chunks)) => Ok(terminated(stream::iter(chunks))),
                Some(MockTurn::Fail(message)) => Err(LlmError::Backend(message)),
                None => Err(LlmError::Backend(
                    "MockBackend: no more turns available".to_string(),
                )),
            }
        }

        async fn complete(&self, request: CompletionRequest) -> Result<String> {
            self.request_log.lock().push(request);
            let reply = self.completions.lock().pop_front();
            match reply {
                Some(Ok(text)) => Ok(text),
                Some(Err(message)) => Err(LlmError::Backend(message)),
                None => Err(LlmError::Backend(
                    "MockBackend: no more completions available".to_string(),
                )),
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
