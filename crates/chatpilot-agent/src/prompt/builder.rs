//! System prompt builder implementation.

use std::fmt::Write;

use crate::types::FileMetadataMap;

/// Substituted for `{context}` when retrieval found nothing.
pub const NO_CONTEXT: &str = "No relevant knowledge base entries found for this specific query.";

/// Default chat system prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"ROLE & PURPOSE
You are a direct, efficient assistant who gets straight to the point. Deliver clear, brief answers without unnecessary elaboration.

CONTEXT USAGE
- You receive reference context and the chat history. Use them to understand the user's needs.
- Never mention, quote, or hint that they exist. Fold relevant details into your answer naturally.

'''
CONTEXT
{context}
'''

OUTPUT STRUCTURE
Keep it brief and scannable.
1. Main answer, using bold, italics and lists where they help.
2. Steps or processes as ordered lists.
3. Tables in valid Markdown syntax.
4. Code or formulas in fenced blocks with a language tag.
5. End with 2-3 natural next questions, without labelling them.

STRICT RULES
- Answer using the provided context and history.
- Stay on the user's task and keep references to yourself out of the answer.
- When something is unclear, ask one concise clarifying question.
- Decline politely when asked for data that cannot be shared."#;

/// Builder for the per-request system prompt.
#[derive(Debug, Clone)]
pub struct SystemPromptBuilder<'a> {
    template: &'a str,
    context: Vec<String>,
    metadata: Option<&'a FileMetadataMap>,
}

impl<'a> SystemPromptBuilder<'a> {
    pub fn new(template: &'a str) -> Self {
        Self {
            template,
            context: Vec::new(),
            metadata: None,
        }
    }

    /// Corpus chunks to place at `{context}`, best first.
    pub fn with_context(mut self, chunks: &[String]) -> Self {
        self.context = chunks.to_vec();
        self
    }

    /// Summaries of uploaded files to append.
    pub fn with_file_metadata(mut self, metadata: Option<&'a FileMetadataMap>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn build(&self) -> String {
        let context = if self.context.is_empty() {
            NO_CONTEXT.to_string()
        } else {
            self.context.join("\n")
        };
        let mut prompt = self.template.replace("{context}", &context);

        if let Some(metadata) = self.metadata.filter(|m| !m.is_empty()) {
            prompt.push_str("\n\nUPLOADED FILE METADATA:\n");
            for (filename, meta) in metadata {
                let _ = writeln!(
                    prompt,
                    "- {filename}: {} rows, {} columns",
                    meta.rows,
                    meta.columns.len()
                );
                let _ = writeln!(prompt, "  Columns: {}", meta.columns.join(", "));
                let _ = writeln!(prompt, "  Numeric: {}", meta.numeric_columns.join(", "));
                let _ = writeln!(
                    prompt,
                    "  Categorical: {}",
                    meta.categorical_columns.join(", ")
                );
            }
        }
        prompt
    }
}
