//! Core types for the chat pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

// ─────────────────────────────────────────────────────────────────────────────
// File Metadata
// ─────────────────────────────────────────────────────────────────────────────

/// Summary of one uploaded tabular file.
///
/// Produced once per request and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Path the file was read from.
    pub filename: String,
    /// Number of data rows.
    pub rows: usize,
    /// Column names in file order.
    pub columns: Vec<String>,
    /// Inferred dtype label per column.
    pub dtypes: BTreeMap<String, String>,
    pub numeric_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
    /// Whether any cell is empty.
    pub has_nulls: bool,
    /// A bounded sample of rows.
    pub sample_data: Vec<Map<String, Value>>,
}

impl FileMetadata {
    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.columns.len())
    }
}

/// Metadata of every uploaded file, keyed by file name.
pub type FileMetadataMap = BTreeMap<String, FileMetadata>;

/// Render metadata for inclusion in a code-generation prompt.
pub fn metadata_summary(metadata: Option<&FileMetadataMap>) -> String {
    match metadata {
        Some(map) if !map.is_empty() => {
            serde_json::to_string_pretty(map).unwrap_or_else(|_| format!("{map:?}"))
        }
        _ => "No files were uploaded.".to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outbound Events
// ─────────────────────────────────────────────────────────────────────────────

/// Text of the error event shown to callers.
pub const GENERIC_ERROR: &str = "An error occurred";

/// One event of the caller-visible stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// Progress notice.
    Status(String),
    /// Partial answer text.
    Content(String),
    /// The answer is complete.
    End,
    /// The request failed; terminal.
    Error(String),
}

impl ChatEvent {
    pub fn status(text: impl Into<String>) -> Self {
        Self::Status(text.into())
    }

    pub fn content(text: impl Into<String>) -> Self {
        Self::Content(text.into())
    }

    pub fn error() -> Self {
        Self::Error(GENERIC_ERROR.to_string())
    }

    /// Event name on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Status(_) => "status",
            Self::Content(_) => "content",
            Self::End => "end",
            Self::Error(_) => "error",
        }
    }

    /// JSON payload on the wire.
    pub fn data(&self) -> Value {
        match self {
            Self::Status(s) => json!({ "status": s }),
            Self::Content(c) => json!({ "content": c }),
            Self::End => json!({ "end": true }),
            Self::Error(e) => json!({ "error": e }),
        }
    }

    /// Whether no event follows this one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End | Self::Error(_))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────────────────────────

/// One chat turn as received from a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub session_id: String,
    pub question: String,
    /// Paths of uploaded files, already validated.
    pub files: Vec<String>,
}

impl ChatRequest {
    pub fn new(session_id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            question: question.into(),
            files: Vec::new(),
        }
    }

    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.files = files;
        self
    }
}
