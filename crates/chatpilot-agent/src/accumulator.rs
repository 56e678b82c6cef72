//! Reconstruction of tool calls from streamed fragments.
//!
//! Providers split a tool call into fragments in one of two shapes:
//!
//! ```text
//! start-then-args:  {name, id}  {args}  {args}  ...
//! interleaved:      {name, args}  {args}  {name, args}  ...   (no ids)
//! ```
//!
//! Fragments with an id go to the call with that id. Fragments without one
//! go to the most recently opened call. Argument pieces are concatenated in
//! arrival order.

use chatpilot_llm::{NormalizedChunk, ToolCall};

/// Id given to calls whose provider never sent one.
pub const DEFAULT_CALL_ID: &str = "call_default";

#[derive(Debug, Default, Clone)]
struct PendingCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

impl PendingCall {
    fn finish(&self) -> ToolCall {
        ToolCall::new(
            self.id.as_deref().unwrap_or(DEFAULT_CALL_ID),
            self.name.as_deref().unwrap_or_default(),
            self.arguments.clone(),
        )
    }
}

/// Accumulates tool-call fragments of one model turn.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: Vec<PendingCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk. Returns `true` if it was a tool-call fragment.
    pub fn push_chunk(&mut self, chunk: &NormalizedChunk) -> bool {
        match chunk {
            NormalizedChunk::ToolCallFragment {
                name,
                call_id,
                args_fragment,
            } => {
                self.push(name.as_deref(), call_id.as_deref(), args_fragment.as_deref());
                true
            }
            _ => false,
        }
    }

    /// Feed one fragment.
    pub fn push(&mut self, name: Option<&str>, call_id: Option<&str>, args: Option<&str>) {
        let index = self.target(call_id);
        let call = &mut self.calls[index];
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            if call.name.is_none() {
                call.name = Some(name.to_string());
            }
        }
        if let Some(args) = args {
            call.arguments.push_str(args);
        }
    }

    /// Index of the call a fragment belongs to, opening one if needed.
    fn target(&mut self, call_id: Option<&str>) -> usize {
        let call_id = call_id.filter(|id| !id.is_empty());
        if let Some(id) = call_id {
            if let Some(index) = self.calls.iter().position(|c| c.id.as_deref() == Some(id)) {
                return index;
            }
            // A late id is adopted by an open call that has none yet.
            if let Some(last) = self.calls.last_mut() {
                if last.id.is_none() {
                    last.id = Some(id.to_string());
                    return self.calls.len() - 1;
                }
            }
        } else if !self.calls.is_empty() {
            return self.calls.len() - 1;
        }

        self.calls.push(PendingCall {
            id: call_id.map(str::to_string),
            ..PendingCall::default()
        });
        self.calls.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Number of distinct calls seen.
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// The first reconstructed call, which is the one dispatched.
    pub fn first(&self) -> Option<ToolCall> {
        self.calls.first().map(PendingCall::finish)
    }

    /// Every reconstructed call in opening order.
    pub fn calls(&self) -> Vec<ToolCall> {
        self.calls.iter().map(PendingCall::finish).collect()
    }
}
