//! System prompt rendering.
//!
//! The chat system prompt is a template with a `{context}` placeholder for
//! retrieved corpus chunks. Uploaded-file summaries are appended after it.
//!
//! # Example
//!
//! ```rust,ignore
//! use chatpilot_agent::prompt::SystemPromptBuilder;
//!
//! let prompt = SystemPromptBuilder::new(DEFAULT_SYSTEM_PROMPT)
//!     .with_context(&chunks)
//!     .with_file_metadata(metadata.as_ref())
//!     .build();
//! ```

mod builder;

pub use builder::{DEFAULT_SYSTEM_PROMPT, NO_CONTEXT, SystemPromptBuilder};
