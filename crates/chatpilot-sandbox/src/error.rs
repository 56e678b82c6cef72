//! Error types for sandbox operations.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while preparing or running generated code.
///
/// None of these escape [`crate::SandboxExecutor::execute`]; they are folded
/// into a failed [`crate::ExecutionOutcome`] whose `stderr` carries the
/// rendered message.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// OS isolation was requested but is not available on this system.
    #[error("Sandbox unavailable: {message}\n\n{install_hint}")]
    Unavailable {
        message: String,
        install_hint: String,
    },

    /// The isolation runtime could not be initialized.
    #[error("Failed to initialize sandbox: {0}")]
    InitializationFailed(String),

    /// The child process could not be started or awaited.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// Wall-clock limit exceeded; the process group was killed.
    #[error("Timeout after {}", format_duration(*.0))]
    Timeout(Duration),

    /// IO error (scratch file creation, spawning).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// sandbox-runtime crate error.
    #[error("Sandbox runtime error: {0}")]
    Runtime(String),
}

fn format_duration(d: Duration) -> String {
    if d.subsec_millis() == 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{}ms", d.as_millis())
    }
}

/// Result type for sandbox operations.
pub type SandboxResult<T> = std::result::Result<T, SandboxError>;
