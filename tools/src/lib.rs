//! Tool Executor Framework - core types, helpers, and the built-in tools agents
//! can be equipped with.

pub mod catalog;
pub mod control;
pub mod mcp_toolset;
pub mod search;
pub mod webpage;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use adk_mcp_types::{EventActions, ToolDefinition};
use serde_json::Value;

pub use catalog::{AGENT_TOOL_PREFIX, CatalogEntry, ToolCatalog, ToolKind};
pub use control::{EXIT_LOOP_TOOL_NAME, ExitLoopTool, TRANSFER_TOOL_NAME, TransferToAgentTool};
pub use mcp_toolset::{McpServerParams, McpToolset};
pub use search::{GoogleSearchConfig, GoogleSearchTool};
pub use webpage::{LoadWebPageTool, WebPageConfig};

/// Tool execution future type alias.
///
/// The output is the JSON value handed back to the model as the function
/// response.
pub type ToolFut<'a> = Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + 'a>>;

/// Toolset resolution future type alias.
pub type ToolsetFut<'a> = Pin<Box<dyn Future<Output = Result<Vec<SharedTool>, ToolError>> + Send + 'a>>;

/// Default cap on a single tool result, in bytes.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 100 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Bad tool args: {message}")]
    BadArgs { message: String },
    #[error("Tool timed out: {tool}")]
    Timeout { tool: String, elapsed: Duration },
    #[error("Tool execution failed: {tool}: {message}")]
    ExecutionFailed { tool: String, message: String },
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },
    #[error("Duplicate tool registered: {name}")]
    DuplicateTool { name: String },
}

impl ToolError {
    pub fn failed(tool: &str, message: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            tool: tool.to_string(),
            message: message.into(),
        }
    }
}

/// Per-call context handed to a tool.
///
/// `actions` starts empty for every call; whatever the tool leaves in it is
/// attached to the function-response event.
#[derive(Debug, Clone)]
pub struct ToolCtx {
    pub invocation_id: String,
    pub agent_name: String,
    pub function_call_id: String,
    pub max_output_bytes: usize,
    pub actions: EventActions,
}

impl ToolCtx {
    pub fn new(
        invocation_id: impl Into<String>,
        agent_name: impl Into<String>,
        function_call_id: impl Into<String>,
    ) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            agent_name: agent_name.into(),
            function_call_id: function_call_id.into(),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            actions: EventActions::default(),
        }
    }
}

pub trait ToolExecutor: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn schema(&self) -> Value;
    fn timeout(&self) -> Option<Duration> {
        None
    }
    fn execute<'a>(&'a self, args: Value, ctx: &'a mut ToolCtx) -> ToolFut<'a>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.schema())
    }
}

pub type SharedTool = Arc<dyn ToolExecutor>;

/// A source of tools resolved at run time (for example a remote MCP server).
pub trait Toolset: Send + Sync {
    /// Label used in logs and error messages.
    fn label(&self) -> String;

    fn tools(&self) -> ToolsetFut<'_>;

    /// Release whatever the toolset holds open. Idempotent.
    fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async {})
    }
}

pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(args: &Value) -> Result<T, ToolError> {
    serde_json::from_value(args.clone()).map_err(|e| ToolError::BadArgs {
        message: e.to_string(),
    })
}

/// Tool registry for one model turn: name-unique executors plus their
/// declarations.
#[derive(Default)]
pub struct ToolRegistry {
    executors: HashMap<String, SharedTool>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn register(&mut self, executor: SharedTool) -> Result<(), ToolError> {
        let name = executor.name().to_string();
        if self.executors.contains_key(&name) {
            return Err(ToolError::DuplicateTool { name });
        }
        self.order.push(name.clone());
        self.executors.insert(name, executor);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<SharedTool, ToolError> {
        self.executors
            .get(name)
            .cloned()
            .ok_or_else(|| ToolError::UnknownTool {
                name: name.to_string(),
            })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.executors.len()
    }

    /// Declarations in registration order.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.executors.get(name))
            .map(|exec| exec.definition())
            .collect()
    }
}

pub fn validate_args(schema: &Value, args: &Value) -> Result<(), ToolError> {
    let validator = jsonschema::validator_for(schema).map_err(|e| ToolError::BadArgs {
        message: format!("Invalid tool schema: {e}"),
    })?;
    let result = validator.validate(args);
    if let Err(err) = result {
        return Err(ToolError::BadArgs {
            message: err.to_string(),
        });
    }
    Ok(())
}

/// Truncate tool output to the effective maximum length.
#[must_use]
pub fn truncate_output(output: String, effective_max: usize) -> String {
    if output.len() <= effective_max {
        return output;
    }
    let marker = "\n\n... [output truncated]";
    if effective_max <= marker.len() {
        return marker[..effective_max].to_string();
    }
    let max_body = effective_max - marker.len();
    let mut end = max_body;
    while end > 0 && !output.is_char_boundary(end) {
        end -= 1;
    }
    let mut truncated = output;
    truncated.truncate(end);
    truncated.push_str(marker);
    truncated
}

/// Run a tool with its timeout applied and its output capped.
///
/// String results are truncated to `ctx.max_output_bytes`; structured results
/// pass through untouched.
pub async fn run_tool(
    tool: &dyn ToolExecutor,
    args: Value,
    ctx: &mut ToolCtx,
) -> Result<Value, ToolError> {
    validate_args(&tool.schema(), &args)?;
    let max = ctx.max_output_bytes;
    let output = match tool.timeout() {
        Some(limit) => tokio::time::timeout(limit, tool.execute(args, ctx))
            .await
            .map_err(|_| ToolError::Timeout {
                tool: tool.name().to_string(),
                elapsed: limit,
            })??,
        None => tool.execute(args, ctx).await?,
    };
    Ok(match output {
        Value::String(text) => Value::String(truncate_output(text, max)),
        other => other,
    })
}
