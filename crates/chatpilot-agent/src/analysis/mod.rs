//! Generated-code data analysis.
//!
//! An [`AnalysisLoop`] asks a [`CodeGenerator`] for a script, runs it through
//! a [`CodeExecutor`], and on failure feeds the code and error back for a
//! corrected attempt, up to a fixed number of attempts.

mod fence;
mod generator;
mod retry;

pub use fence::strip_code_fence;
pub use generator::{CODE_GENERATOR_PROMPT, CodeGenerator, LlmCodeGenerator};
pub use retry::{AnalysisAttempt, AnalysisLoop, AnalysisOutcome, CodeExecutor, DEFAULT_MAX_ATTEMPTS};
