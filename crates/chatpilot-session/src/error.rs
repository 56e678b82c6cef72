//! Error types for history store operations.

/// Error type for history store operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Session was not found in the store.
    #[error("Session not found: {0}")]
    NotFound(String),

    /// Session has expired due to TTL.
    #[error("Session expired: {0}")]
    Expired(String),

    /// Failure inside a store backend.
    #[error("History store error: {0}")]
    Store(String),
}

/// Result type for history store operations.
pub type Result<T> = std::result::Result<T, SessionError>;
