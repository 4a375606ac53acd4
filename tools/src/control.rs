//! Flow-control tools: they do no work of their own, they only set
//! [`EventActions`](adk_mcp_types::EventActions) flags the agent loop acts on.

use serde::Deserialize;
use serde_json::{Value, json};

use super::{ToolCtx, ToolError, ToolExecutor, ToolFut, parse_args};

pub const EXIT_LOOP_TOOL_NAME: &str = "exit_loop";
pub const TRANSFER_TOOL_NAME: &str = "transfer_to_agent";

/// Ends the enclosing loop agent.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExitLoopTool;

impl ToolExecutor for ExitLoopTool {
    fn name(&self) -> &str {
        EXIT_LOOP_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Exits the loop. Call this function only when you are instructed to do so."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    fn execute<'a>(&'a self, _args: Value, ctx: &'a mut ToolCtx) -> ToolFut<'a> {
        Box::pin(async move {
            tracing::debug!(agent = %ctx.agent_name, "exit_loop requested");
            ctx.actions.escalate = true;
            Ok(json!({}))
        })
    }
}

#[derive(Debug, Deserialize)]
struct TransferArgs {
    agent_name: String,
}

/// Hands control to one of the calling agent's sub-agents.
///
/// Attached automatically to LLM agents that have sub-agents; `targets` is
/// the set of names the model may pick from.
#[derive(Debug, Clone)]
pub struct TransferToAgentTool {
    targets: Vec<String>,
}

impl TransferToAgentTool {
    #[must_use]
    pub fn new(targets: Vec<String>) -> Self {
        Self { targets }
    }

    #[must_use]
    pub fn targets(&self) -> &[String] {
        &self.targets
    }
}

impl ToolExecutor for TransferToAgentTool {
    fn name(&self) -> &str {
        TRANSFER_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Transfer the question to another agent. Use this when another agent is better suited to answer."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "agent_name": {
                    "type": "string",
                    "enum": self.targets,
                    "description": "The agent to transfer to"
                }
            },
            "required": ["agent_name"]
        })
    }

    fn execute<'a>(&'a self, args: Value, ctx: &'a mut ToolCtx) -> ToolFut<'a> {
        Box::pin(async move {
            let typed: TransferArgs = parse_args(&args)?;
            if !self.targets.iter().any(|t| *t == typed.agent_name) {
                return Err(ToolError::BadArgs {
                    message: format!("unknown agent '{}'", typed.agent_name),
                });
            }
            tracing::info!(from = %ctx.agent_name, to = %typed.agent_name, "Transferring to agent");
            ctx.actions.transfer_to_agent = Some(typed.agent_name);
            Ok(json!({}))
        })
    }
}
