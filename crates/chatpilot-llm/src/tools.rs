//! The built-in tools advertised to every provider.
//!
//! Definitions are provider-neutral; adapters render them into their own
//! function-calling syntax.

use serde_json::{Value, json};

pub const WEB_SEARCH: &str = "web_search";
pub const WEB_FETCH: &str = "web_fetch";
pub const ANALYZE_DATA: &str = "analyze_data";

/// A tool as name, description and JSON schema for its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// OpenAI-style `{"type":"function","function":{..}}` declaration.
    pub fn to_function_schema(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }

    /// Anthropic-style declaration with `input_schema`.
    pub fn to_input_schema(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "input_schema": self.parameters,
        })
    }
}

/// `web_search(question)`, `web_fetch(url)` and `analyze_data(TODO)`.
pub fn builtin_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            WEB_SEARCH,
            "Rephrase the user's question to do a web search to find relevant information.",
            json!({
                "type": "object",
                "properties": {
                    "question": {
                        "type": "string",
                        "description": "The user's question to be rephrased and web searched."
                    }
                },
                "required": ["question"]
            }),
        ),
        ToolDefinition::new(
            WEB_FETCH,
            "Fetch and analyze the content of a specific URL provided by the user.",
            json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "format": "uri",
                        "description": "The exact URL to fetch content from."
                    }
                },
                "required": ["url"]
            }),
        ),
        ToolDefinition::new(
            ANALYZE_DATA,
            "Use when the user asks to analyze provided data or files using code.",
            json!({
                "type": "object",
                "properties": {
                    "TODO": {
                        "type": "string",
                        "description": "A clear, specific description of what analysis to perform on the data. MUST be a complete, actionable task description."
                    }
                },
                "required": ["TODO"]
            }),
        ),
    ]
}
