//! Core domain types for adk-mcp.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

mod content;
mod event;
mod name;

pub use content::{Content, FunctionCall, FunctionResponse, Part, Role};
pub use event::{Event, EventActions};
pub use name::{AgentName, InvalidAgentName};

use serde::{Deserialize, Serialize};

/// Model used when a caller does not name one.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Author recorded on events that carry end-user input.
pub const USER_AUTHOR: &str = "user";

/// A tool definition exposed to the model as a callable function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The name of the tool (function name).
    pub name: String,
    /// A description of what the tool does.
    pub description: String,
    /// JSON Schema describing the tool's parameters.
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Token consumption reported by a model backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_definition_serializes_parameters_verbatim() {
        let def = ToolDefinition::new(
            "load_web_page",
            "Fetch a page",
            serde_json::json!({"type": "object"}),
        );
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["name"], "load_web_page");
        assert_eq!(json["parameters"]["type"], "object");
    }
}
