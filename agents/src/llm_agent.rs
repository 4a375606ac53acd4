//! The model-driven agent.

use std::collections::BTreeMap;
use std::sync::Arc;

use adk_mcp_providers::{LlmRequest, ModelBackend};
use adk_mcp_tools::{
    SharedTool, ToolCtx, ToolError, ToolRegistry, Toolset, TransferToAgentTool, run_tool,
};
use adk_mcp_types::{
    Content, DEFAULT_MODEL, Event, EventActions, FunctionCall, FunctionResponse, Part, Role,
    USER_AUTHOR,
};
use serde_json::{Value, json};
use tokio::sync::RwLock;

use crate::{Agent, AgentError, AgentFut, InvocationContext, SharedAgent};

/// An agent that asks a model what to do next.
///
/// Each turn sends the visible session history to the model. Function calls
/// in the reply are executed and their responses emitted as one event, then
/// the model is called again; a reply without function calls ends the run.
/// A `transfer_to_agent` call hands the rest of the run to that sub-agent and
/// an `escalate` action ends it.
///
/// Tools may be added after construction through `&self`, so every holder of
/// a shared agent sees them.
pub struct LlmAgent {
    name: String,
    model: String,
    instruction: String,
    description: String,
    backend: Arc<dyn ModelBackend>,
    tools: RwLock<Vec<SharedTool>>,
    toolsets: RwLock<Vec<Arc<dyn Toolset>>>,
    sub_agents: Vec<SharedAgent>,
}

impl LlmAgent {
    pub fn new(name: impl Into<String>, backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            name: name.into(),
            model: DEFAULT_MODEL.to_string(),
            instruction: String::new(),
            description: String::new(),
            backend,
            tools: RwLock::new(Vec::new()),
            toolsets: RwLock::new(Vec::new()),
            sub_agents: Vec::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tools(mut self, tools: Vec<SharedTool>) -> Self {
        self.tools.get_mut().extend(tools);
        self
    }

    pub fn with_sub_agents(mut self, sub_agents: Vec<SharedAgent>) -> Self {
        self.sub_agents = sub_agents;
        self
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub async fn add_tool(&self, tool: SharedTool) {
        self.tools.write().await.push(tool);
    }

    pub async fn add_toolset(&self, toolset: Arc<dyn Toolset>) {
        self.toolsets.write().await.push(toolset);
    }

    /// Names of the directly attached tools (toolsets resolve at run time).
    pub async fn tool_names(&self) -> Vec<String> {
        self.tools
            .read()
            .await
            .iter()
            .map(|t| t.name().to_string())
            .collect()
    }

    /// Release every attached toolset.
    pub async fn close(&self) {
        let toolsets = self.toolsets.read().await.clone();
        for toolset in toolsets {
            toolset.close().await;
        }
    }

    async fn resolve_tools(&self) -> Result<ToolRegistry, AgentError> {
        let mut candidates: Vec<SharedTool> = self.tools.read().await.clone();

        let toolsets = self.toolsets.read().await.clone();
        for toolset in toolsets {
            candidates.extend(toolset.tools().await?);
        }

        if !self.sub_agents.is_empty() {
            let targets = self.sub_agents.iter().map(|a| a.name().to_string()).collect();
            candidates.push(Arc::new(TransferToAgentTool::new(targets)));
        }

        let mut registry = ToolRegistry::default();
        for tool in candidates {
            if let Err(e) = registry.register(tool) {
                tracing::warn!(agent = %self.name, "Skipping tool: {e}");
            }
        }
        Ok(registry)
    }

    fn system_instruction(&self, state: &BTreeMap<String, Value>) -> String {
        let mut sections = Vec::new();

        let instruction = inject_state(&self.instruction, state);
        if !instruction.trim().is_empty() {
            sections.push(instruction);
        }

        let mut identity = format!("You are an agent. Your internal name is \"{}\".", self.name);
        if !self.description.is_empty() {
            identity.push_str(&format!(
                " The description about you is \"{}\".",
                self.description
            ));
        }
        sections.push(identity);

        if !self.sub_agents.is_empty() {
            let mut transfer = String::from("You have a list of other agents to transfer to:\n");
            for agent in &self.sub_agents {
                transfer.push_str(&format!(
                    "\nAgent name: {}\nAgent description: {}\n",
                    agent.name(),
                    agent.description()
                ));
            }
            transfer.push_str(
                "\nIf another agent is better for answering the question according to its \
                 description, call `transfer_to_agent` function to transfer the question to that \
                 agent. When transferring, do not generate any text other than the function call.",
            );
            sections.push(transfer);
        }

        sections.join("\n\n")
    }

    /// Session history as model contents. Events by other agents are
    /// presented as user-side context.
    fn build_contents(&self, history: &[Event]) -> Vec<Content> {
        history
            .iter()
            .filter_map(|event| {
                let content = event.content.as_ref().filter(|c| !c.is_empty())?;
                if event.author == self.name || event.author == USER_AUTHOR {
                    Some(content.clone())
                } else {
                    Some(present_foreign_content(&event.author, content))
                }
            })
            .collect()
    }

    async fn execute_calls(
        &self,
        ctx: &InvocationContext,
        registry: &ToolRegistry,
        calls: Vec<FunctionCall>,
    ) -> (Vec<Part>, EventActions) {
        let mut parts = Vec::with_capacity(calls.len());
        let mut actions = EventActions::default();

        for call in calls {
            let mut tool_ctx = ToolCtx::new(ctx.invocation_id(), &self.name, &call.id);
            tool_ctx.max_output_bytes = ctx.run_config().max_tool_output_bytes;

            let outcome = match registry.lookup(&call.name) {
                Ok(tool) => run_tool(tool.as_ref(), call.args, &mut tool_ctx).await,
                Err(e) => Err(e),
            };
            let response = match outcome {
                Ok(value) => into_response_object(value),
                Err(e) => {
                    tracing::warn!(agent = %self.name, tool = %call.name, "Tool call failed: {e}");
                    tool_error_response(&e)
                }
            };

            actions.merge(tool_ctx.actions);
            parts.push(Part::FunctionResponse(FunctionResponse {
                id: call.id,
                name: call.name,
                response,
            }));
        }

        (parts, actions)
    }
}

impl Agent for LlmAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn sub_agents(&self) -> &[SharedAgent] {
        &self.sub_agents
    }

    fn run<'a>(&'a self, ctx: &'a InvocationContext) -> AgentFut<'a> {
        Box::pin(async move {
            loop {
                ctx.count_llm_call()?;

                let registry = self.resolve_tools().await?;
                let history = ctx.visible_history().await?;
                let state = ctx.sessions().state(ctx.session_key()).await?;
                let request = LlmRequest {
                    model: self.model.clone(),
                    system_instruction: Some(self.system_instruction(&state)),
                    contents: self.build_contents(&history),
                    tools: registry.definitions(),
                };

                tracing::debug!(
                    agent = %self.name,
                    backend = self.backend.name(),
                    contents = request.contents.len(),
                    tools = request.tools.len(),
                    "Calling model"
                );
                let response = self.backend.generate(&request).await?;
                tracing::debug!(
                    agent = %self.name,
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    "Model replied"
                );

                if response.content.is_empty() {
                    return Ok(());
                }

                let calls: Vec<FunctionCall> = response
                    .content
                    .function_calls()
                    .into_iter()
                    .cloned()
                    .collect();
                ctx.emit(ctx.new_event(&self.name).with_content(response.content))
                    .await?;
                if calls.is_empty() {
                    return Ok(());
                }

                let (parts, actions) = self.execute_calls(ctx, &registry, calls).await;
                let transfer = actions.transfer_to_agent.clone();
                let escalate = actions.escalate;
                let event = ctx
                    .new_event(&self.name)
                    .with_content(Content::new(Role::User, parts))
                    .with_actions(actions);
                ctx.emit(event).await?;

                if let Some(target) = transfer {
                    let Some(agent) = self.sub_agents.iter().find(|a| a.name() == target) else {
                        return Err(AgentError::UnknownTransferTarget {
                            from: self.name.clone(),
                            to: target,
                        });
                    };
                    tracing::info!(from = %self.name, to = %target, "Transferring control");
                    return agent.run(ctx).await;
                }
                if escalate {
                    return Ok(());
                }
            }
        })
    }
}

fn present_foreign_content(author: &str, content: &Content) -> Content {
    let mut parts = vec![Part::text("For context:")];
    for part in &content.parts {
        let text = match part {
            Part::Text { text } => format!("[{author}] said: {text}"),
            Part::FunctionCall(call) => format!(
                "[{author}] called tool `{}` with parameters: {}",
                call.name, call.args
            ),
            Part::FunctionResponse(response) => format!(
                "[{author}] `{}` tool returned result: {}",
                response.name, response.response
            ),
        };
        parts.push(Part::text(text));
    }
    Content::new(Role::User, parts)
}

fn into_response_object(value: Value) -> Value {
    match value {
        Value::Object(_) => value,
        other => json!({ "result": other }),
    }
}

fn tool_error_response(error: &ToolError) -> Value {
    json!({ "error": error.to_string() })
}

fn is_state_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// Replace `{key}` placeholders with session state values. Unknown keys and
/// anything that is not a plain identifier are left as written.
fn inject_state(template: &str, state: &BTreeMap<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let key = after[..end].trim();
        if is_state_key(key)
            && let Some(value) = state.get(key)
        {
            match value {
                Value::String(s) => out.push_str(s),
                other => out.push_str(&other.to_string()),
            }
        } else {
            out.push_str(&rest[start..=start + 1 + end]);
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}
