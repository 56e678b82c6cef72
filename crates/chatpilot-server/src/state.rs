//! Application state shared across handlers.

use std::sync::Arc;

use chatpilot_agent::ChatOrchestrator;

use crate::config::ServerConfig;
use crate::ratelimit::{SharedRateLimiter, create_rate_limiter};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Handles every chat request.
    pub chat: Arc<ChatOrchestrator>,

    /// Server configuration.
    pub config: Arc<ServerConfig>,

    /// Chat limiter; `None` when rate limiting is disabled.
    pub limiter: Option<SharedRateLimiter>,
}

impl AppState {
    pub fn new(chat: Arc<ChatOrchestrator>, config: ServerConfig) -> Self {
        let limiter = config
            .rate_limiting
            .then(|| create_rate_limiter(config.chat_rpm));
        Self {
            chat,
            config: Arc::new(config),
            limiter,
        }
    }
}
