//! In-memory history store with LRU eviction and idle TTL.

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use chatpilot_llm::Message;
use lru::LruCache;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::config::StoreConfig;
use crate::error::Result;
use crate::store::HistoryStore;
use crate::ttl::TtlTracker;

struct Inner {
    lru: LruCache<String, Vec<Message>>,
    ttl: TtlTracker,
}

impl Inner {
    /// Drop `session_id` if it has idled past the TTL.
    fn expire_if_idle(&mut self, session_id: &str) {
        if self.ttl.is_expired(session_id) {
            self.ttl.remove(session_id);
            if self.lru.pop(session_id).is_some() {
                debug!(session_id = %session_id, "Session expired, starting over");
            }
        }
    }
}

/// History held in process memory.
///
/// A single short-held lock guards the map; no I/O happens while it is
/// held, so sessions never wait on each other for long.
pub struct InMemoryHistoryStore {
    inner: Mutex<Inner>,
    config: StoreConfig,
}

impl InMemoryHistoryStore {
    pub fn new(config: StoreConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_sessions).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                lru: LruCache::new(capacity),
                ttl: TtlTracker::new(config.ttl),
            }),
            config,
        }
    }

    /// Get the store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Number of sessions currently held.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.lru.len()
    }

    /// Whether no sessions are held.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every session idle past the TTL. Returns how many were dropped.
    pub async fn cleanup_expired(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let expired = inner.ttl.drain_expired();
        let mut count = 0;
        for session_id in expired {
            if inner.lru.pop(&session_id).is_some() {
                count += 1;
            }
        }
        if count > 0 {
            debug!(count, "Cleaned up expired sessions");
        }
        count
    }

    /// Run [`cleanup_expired`](Self::cleanup_expired) periodically.
    ///
    /// Returns `None` when no TTL is configured.
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        self.config.ttl?;
        let store = Arc::downgrade(self);
        let interval = self.config.cleanup_interval;
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match store.upgrade() {
                    Some(store) => {
                        store.cleanup_expired().await;
                    }
                    None => break,
                }
            }
        }))
    }
}

impl Default for InMemoryHistoryStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn get_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        let mut inner = self.inner.lock().await;
        inner.expire_if_idle(session_id);
        let messages = inner.lru.get(session_id).cloned().unwrap_or_default();
        trace!(session_id = %session_id, count = messages.len(), "History read");
        Ok(messages)
    }

    async fn add_message(&self, session_id: &str, message: Message) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.expire_if_idle(session_id);

        if let Some(messages) = inner.lru.get_mut(session_id) {
            messages.push(message);
        } else if let Some((evicted, _)) = inner.lru.push(session_id.to_string(), vec![message]) {
            debug!(session_id = %evicted, "Evicting LRU session to make room");
            inner.ttl.remove(&evicted);
        }
        inner.ttl.touch(session_id);
        Ok(())
    }
}
