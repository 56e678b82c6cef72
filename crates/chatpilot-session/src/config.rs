//! Configuration for the in-memory history store.

use std::time::Duration;

/// Default maximum number of sessions to keep.
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// Configuration for [`crate::InMemoryHistoryStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum number of sessions kept before LRU eviction.
    pub max_sessions: usize,

    /// Idle time after which a session is discarded. `None` keeps sessions
    /// until evicted.
    pub ttl: Option<Duration>,

    /// How often the background sweeper drops idle sessions.
    pub cleanup_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_sessions: DEFAULT_MAX_SESSIONS,
            ttl: None,
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

impl StoreConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of sessions.
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }

    /// Set the idle TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Set the sweep interval.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}
