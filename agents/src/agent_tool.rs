use std::collections::BTreeMap;
use std::sync::Arc;

use adk_mcp_tools::{ToolCtx, ToolError, ToolExecutor, ToolFut};
use adk_mcp_types::Content;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{InMemorySessionService, RunConfig, Runner, SharedAgent};

const AGENT_TOOL_USER: &str = "tmp_user";

#[derive(Debug, Deserialize)]
struct AgentToolArgs {
    request: String,
}

/// Exposes an agent to other agents as a callable tool.
///
/// Every call runs the wrapped agent in a fresh in-memory session and
/// returns the text of its last event. State changes the wrapped agent makes
/// are forwarded to the caller's session.
pub struct AgentTool {
    agent: SharedAgent,
    run_config: RunConfig,
}

impl AgentTool {
    pub fn new(agent: SharedAgent) -> Self {
        Self {
            agent,
            run_config: RunConfig::default(),
        }
    }

    pub fn with_run_config(mut self, run_config: RunConfig) -> Self {
        self.run_config = run_config;
        self
    }
}

impl ToolExecutor for AgentTool {
    fn name(&self) -> &str {
        self.agent.name()
    }

    fn description(&self) -> &str {
        self.agent.description()
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "request": {
                    "type": "string",
                    "description": "What to ask the agent"
                }
            },
            "required": ["request"]
        })
    }

    fn execute<'a>(&'a self, args: Value, ctx: &'a mut ToolCtx) -> ToolFut<'a> {
        Box::pin(async move {
            let typed: AgentToolArgs = serde_json::from_value(args).map_err(|e| {
                ToolError::BadArgs {
                    message: e.to_string(),
                }
            })?;
            let name = self.agent.name();

            let sessions = Arc::new(InMemorySessionService::new());
            let session = sessions
                .create_session(name, AGENT_TOOL_USER, None, BTreeMap::new())
                .await
                .map_err(|e| ToolError::failed(name, e.to_string()))?;
            let events = Runner::new(name, Arc::clone(&self.agent), sessions)
                .with_run_config(self.run_config)
                .run(
                    AGENT_TOOL_USER,
                    session.id(),
                    Content::user_text(typed.request),
                )
                .await
                .map_err(|e| ToolError::failed(name, e.to_string()))?;

            for event in &events {
                ctx.actions
                    .state_delta
                    .extend(event.actions.state_delta.clone());
            }
            let text = events
                .iter()
                .rev()
                .find_map(adk_mcp_types::Event::text)
                .unwrap_or_default();
            Ok(Value::String(text))
        })
    }
}
