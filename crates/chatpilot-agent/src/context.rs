//! Corpus retrieval for system-prompt context.
//!
//! Indexing and ranking live outside this crate; the orchestrator only needs
//! ranked text chunks for a query.

use async_trait::async_trait;

use crate::error::Result;

/// Source of ranked context chunks.
#[async_trait]
pub trait CorpusRetriever: Send + Sync {
    /// Chunks relevant to `query`, best first. May be empty.
    async fn retrieve(&self, query: &str) -> Result<Vec<String>>;
}

/// A corpus with nothing in it.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyCorpus;

#[async_trait]
impl CorpusRetriever for EmptyCorpus {
    async fn retrieve(&self, _query: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// A fixed set of chunks returned for every query.
///
/// Useful for pinning reference material into every conversation.
#[derive(Debug, Clone, Default)]
pub struct StaticCorpus {
    chunks: Vec<String>,
}

impl StaticCorpus {
    pub fn new(chunks: Vec<String>) -> Self {
        Self { chunks }
    }
}

#[async_trait]
impl CorpusRetriever for StaticCorpus {
    async fn retrieve(&self, _query: &str) -> Result<Vec<String>> {
        Ok(self.chunks.clone())
    }
}
