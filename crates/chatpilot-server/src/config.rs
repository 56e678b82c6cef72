//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Default chat requests per minute.
pub const DEFAULT_CHAT_RPM: u32 = 10;

/// Longest accepted question, in characters.
pub const MAX_QUESTION_CHARS: usize = 1000;

/// Most files one chat request may reference.
pub const MAX_FILES_PER_REQUEST: usize = 3;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_address: SocketAddr,

    /// Enable rate limiting on the chat endpoint.
    pub rate_limiting: bool,

    /// Rate limit: chat requests per minute, shared by all clients.
    pub chat_rpm: u32,

    /// Enable request logging.
    pub request_logging: bool,

    /// Root of uploaded files; a request's files live in `upload_dir/<session_id>/`.
    pub upload_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8000)),
            rate_limiting: true,
            chat_rpm: DEFAULT_CHAT_RPM,
            request_logging: true,
            upload_dir: PathBuf::from("uploads"),
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bind address.
    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    /// Enable or disable rate limiting.
    pub fn with_rate_limiting(mut self, enabled: bool) -> Self {
        self.rate_limiting = enabled;
        self
    }

    /// Set the chat rate limit (requests per minute).
    pub fn with_chat_rpm(mut self, rpm: u32) -> Self {
        self.chat_rpm = rpm;
        self
    }

    /// Enable or disable request logging.
    pub fn with_request_logging(mut self, enabled: bool) -> Self {
        self.request_logging = enabled;
        self
    }

    pub fn with_upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = dir.into();
        self
    }
}
