//! Execution of model-generated code in a throwaway child process.
//!
//! Every call writes the code to a fresh scratch file, runs it with the
//! configured interpreter under a hard wall-clock timeout, and removes the
//! file again on every exit path. The child runs in its own process group so
//! a timeout (or the caller dropping the future) takes down everything it
//! spawned.
//!
//! When isolation is enabled the interpreter command is additionally wrapped
//! by the `sandbox-runtime` crate:
//!
//! | Platform | Backend | Requirements |
//! |----------|---------|--------------|
//! | macOS | sandbox-exec | Built-in (no extra deps) |
//! | Linux | bubblewrap + socat | `apt install bubblewrap socat` |
//!
//! # Example
//!
//! ```no_run
//! use chatpilot_sandbox::{SandboxConfig, SandboxExecutor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let executor = SandboxExecutor::new(SandboxConfig::default()).await?;
//!     let outcome = executor.execute("print(6 * 7)").await;
//!     println!("{:?}", outcome.stdout);
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod executor;
mod isolation;
mod platform;

pub use config::SandboxConfig;
pub use error::{SandboxError, SandboxResult};
pub use executor::{ExecutionOutcome, SandboxExecutor};
pub use platform::{Platform, SandboxStatus};
