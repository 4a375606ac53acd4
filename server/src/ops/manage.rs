//! Creating, listing and extending agents.

use std::sync::Arc;

use adk_mcp_agents::{AgentTool, LlmAgent, LoopAgent, ParallelAgent, SequentialAgent, SharedAgent};
use adk_mcp_tools::{AGENT_TOOL_PREFIX, McpServerParams, McpToolset, SharedTool, Toolset};
use adk_mcp_types::AgentName;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::agent_not_found;
use crate::operation::{Envelope, OpFut, Operation, OperationError, parse_args};
use crate::state::{AgentEntry, AgentKind, AgentRecord, ServerState};

const DEFAULT_LOOP_ITERATIONS: usize = 3;
const MAX_LOOP_ITERATIONS: usize = 100;

fn validated_name(name: &str) -> Result<(), OperationError> {
    AgentName::new(name)
        .map(|_| ())
        .map_err(|e| OperationError::InvalidArguments(e.to_string()))
}

/// Python-style list rendering: `['a', 'b']`.
fn quoted_list(names: &[String]) -> String {
    let quoted: Vec<String> = names.iter().map(|n| format!("'{n}'")).collect();
    format!("[{}]", quoted.join(", "))
}

#[derive(Debug, Deserialize)]
struct CreateAgentArgs {
    name: String,
    instruction: String,
    model: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tools: Vec<String>,
}

pub struct CreateAgent;

impl CreateAgent {
    /// Executors for the requested names. Names that resolve to nothing are
    /// logged and skipped.
    async fn resolve_tools(state: &ServerState, names: &[String]) -> Vec<SharedTool> {
        let mut tools = Vec::with_capacity(names.len());
        for name in names {
            if let Some(tool) = state.catalog().resolve(name) {
                tools.push(tool);
                continue;
            }
            if let Some(target) = name.strip_prefix(AGENT_TOOL_PREFIX) {
                if let Some(entry) = state.agent(target).await {
                    let tool = AgentTool::new(entry.agent).with_run_config(state.run_config());
                    tools.push(Arc::new(tool) as SharedTool);
                } else {
                    tracing::warn!(tool = %name, "Agent tool target not found");
                }
                continue;
            }
            tracing::warn!(tool = %name, "Unknown tool");
        }
        tools
    }
}

impl Operation for CreateAgent {
    fn name(&self) -> &'static str {
        "create_adk_agent"
    }

    fn description(&self) -> &'static str {
        "Create a new Google ADK agent with specified configuration"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "Name for the agent"
                },
                "model": {
                    "type": "string",
                    "description": "Model to use (e.g., 'gemini-2.0-flash', 'gemini-1.5-pro')",
                    "default": "gemini-2.0-flash"
                },
                "instruction": {
                    "type": "string",
                    "description": "System instruction for the agent"
                },
                "description": {
                    "type": "string",
                    "description": "Description of what the agent does"
                },
                "tools": {
                    "type": "array",
                    "description": "List of tool names to include with the agent (google_search, load_web_page, exit_loop, agent_tool:<agent name>)",
                    "items": {"type": "string"},
                    "default": []
                }
            },
            "required": ["name", "instruction"]
        })
    }

    fn call<'a>(&'a self, state: &'a ServerState, args: Value) -> OpFut<'a> {
        Box::pin(async move {
            let args: CreateAgentArgs = parse_args(args)?;
            validated_name(&args.name)?;
            let model = args
                .model
                .unwrap_or_else(|| state.settings().default_model.clone());

            let tools = Self::resolve_tools(state, &args.tools).await;
            let tools_count = tools.len();
            let agent = LlmAgent::new(&args.name, Arc::clone(state.backend()))
                .with_model(&model)
                .with_instruction(&args.instruction)
                .with_description(&args.description)
                .with_tools(tools);

            let record = AgentRecord::llm(
                &args.name,
                &model,
                args.instruction,
                &args.description,
                args.tools,
            );
            state
                .insert_agent(AgentEntry::from_llm(Arc::new(agent), record))
                .await;

            Ok(Envelope::Success(json!({
                "status": "success",
                "message": format!("Successfully created agent '{}'", args.name),
                "agent": {
                    "name": args.name,
                    "model": model,
                    "description": args.description,
                    "tools_count": tools_count,
                }
            })))
        })
    }
}

pub struct ListAgents;

impl Operation for ListAgents {
    fn name(&self) -> &'static str {
        "list_adk_agents"
    }

    fn description(&self) -> &'static str {
        "List all created ADK agents"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        })
    }

    fn call<'a>(&'a self, state: &'a ServerState, _args: Value) -> OpFut<'a> {
        Box::pin(async move {
            let agents: Vec<Value> = state
                .agent_records()
                .await
                .into_iter()
                .map(|record| {
                    json!({
                        "name": record.name,
                        "model": record.model,
                        "description": record.description,
                        "tools": record.tools,
                    })
                })
                .collect();
            Ok(Envelope::Success(json!({
                "status": "success",
                "total_count": agents.len(),
                "agents": agents,
            })))
        })
    }
}

#[derive(Debug, Deserialize)]
struct AgentNameArgs {
    agent_name: String,
}

pub struct GetAgentInfo;

impl Operation for GetAgentInfo {
    fn name(&self) -> &'static str {
        "get_adk_agent_info"
    }

    fn description(&self) -> &'static str {
        "Get detailed information about a specific ADK agent"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "agent_name": {
                    "type": "string",
                    "description": "Name of the agent to get info for"
                }
            },
            "required": ["agent_name"]
        })
    }

    fn call<'a>(&'a self, state: &'a ServerState, args: Value) -> OpFut<'a> {
        Box::pin(async move {
            let args: AgentNameArgs = parse_args(args)?;
            let Some(entry) = state.agent(&args.agent_name).await else {
                return Ok(agent_not_found(&args.agent_name));
            };
            let record = entry.record;

            let mut info = Map::new();
            info.insert("name".into(), json!(record.name));
            info.insert("model".into(), json!(record.model));
            info.insert("instruction".into(), json!(record.instruction));
            info.insert("description".into(), json!(record.description));
            info.insert("tools".into(), json!(record.tools));
            info.insert("created".into(), json!(true));
            info.insert("type".into(), json!(record.kind));
            if record.kind != AgentKind::LlmAgent {
                info.insert("sub_agents".into(), json!(record.sub_agents));
            }
            if let Some(mcp) = record.mcp_tools {
                info.insert("mcp_tools".into(), json!(mcp));
            }
            if let Some(max) = record.max_iterations {
                info.insert("max_iterations".into(), json!(max));
            }

            Ok(Envelope::Success(json!({
                "status": "success",
                "agent": info,
            })))
        })
    }
}

/// How a multi-agent system drives its sub-agents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SystemMode {
    /// A model-driven agent that hands off through `transfer_to_agent`.
    #[default]
    Coordinator,
    Sequential,
    Parallel,
    Loop,
}

impl SystemMode {
    fn as_str(self) -> &'static str {
        match self {
            Self::Coordinator => "coordinator",
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
            Self::Loop => "loop",
        }
    }
}

#[derive(Debug, Deserialize)]
struct MultiAgentArgs {
    coordinator_name: String,
    coordinator_instruction: String,
    sub_agents: Vec<String>,
    model: Option<String>,
    #[serde(default)]
    mode: SystemMode,
    max_iterations: Option<usize>,
}

pub struct CreateMultiAgentSystem;

impl Operation for CreateMultiAgentSystem {
    fn name(&self) -> &'static str {
        "create_multi_agent_system"
    }

    fn description(&self) -> &'static str {
        "Create a multi-agent system with a coordinator and sub-agents"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "coordinator_name": {
                    "type": "string",
                    "description": "Name for the coordinator agent"
                },
                "coordinator_instruction": {
                    "type": "string",
                    "description": "Instruction for the coordinator agent"
                },
                "sub_agents": {
                    "type": "array",
                    "description": "List of sub-agent names to include",
                    "items": {"type": "string"}
                },
                "model": {
                    "type": "string",
                    "description": "Model to use for the coordinator",
                    "default": "gemini-2.0-flash"
                },
                "mode": {
                    "type": "string",
                    "description": "coordinator delegates by model choice; sequential, parallel and loop run the sub-agents directly",
                    "enum": ["coordinator", "sequential", "parallel", "loop"],
                    "default": "coordinator"
                },
                "max_iterations": {
                    "type": "integer",
                    "description": "Iteration cap for loop mode",
                    "minimum": 1,
                    "maximum": MAX_LOOP_ITERATIONS,
                    "default": DEFAULT_LOOP_ITERATIONS
                }
            },
            "required": ["coordinator_name", "coordinator_instruction", "sub_agents"]
        })
    }

    fn call<'a>(&'a self, state: &'a ServerState, args: Value) -> OpFut<'a> {
        Box::pin(async move {
            let args: MultiAgentArgs = parse_args(args)?;
            validated_name(&args.coordinator_name)?;

            let mut missing = Vec::new();
            let mut subs: Vec<SharedAgent> = Vec::with_capacity(args.sub_agents.len());
            for name in &args.sub_agents {
                match state.agent(name).await {
                    Some(entry) => subs.push(entry.agent),
                    None => missing.push(name.clone()),
                }
            }
            if !missing.is_empty() {
                return Ok(Envelope::failure(format!(
                    "Missing sub-agents: {}. Create them first.",
                    quoted_list(&missing)
                )));
            }
            if subs.is_empty() && args.mode != SystemMode::Coordinator {
                return Ok(Envelope::failure(format!(
                    "A {} system needs at least one sub-agent",
                    args.mode.as_str()
                )));
            }

            let name = args.coordinator_name;
            let count = subs.len();
            let model = args
                .model
                .unwrap_or_else(|| state.settings().default_model.clone());
            let mut record = AgentRecord::llm(
                &name,
                &model,
                &args.coordinator_instruction,
                format!("Multi-agent coordinator with {count} sub-agents"),
                Vec::new(),
            );
            record.sub_agents.clone_from(&args.sub_agents);

            let entry = match args.mode {
                SystemMode::Coordinator => {
                    record.kind = AgentKind::Coordinator;
                    let agent = LlmAgent::new(&name, Arc::clone(state.backend()))
                        .with_model(&model)
                        .with_instruction(&args.coordinator_instruction)
                        .with_description(format!("Coordinator agent managing {count} sub-agents"))
                        .with_sub_agents(subs);
                    AgentEntry::from_llm(Arc::new(agent), record)
                }
                SystemMode::Sequential => {
                    record.kind = AgentKind::SequentialAgent;
                    let agent = SequentialAgent::new(&name, subs)
                        .with_description(format!("Runs {count} sub-agents in sequence"));
                    workflow_entry(Arc::new(agent), record)
                }
                SystemMode::Parallel => {
                    record.kind = AgentKind::ParallelAgent;
                    let agent = ParallelAgent::new(&name, subs)
                        .with_description(format!("Runs {count} sub-agents in parallel"));
                    workflow_entry(Arc::new(agent), record)
                }
                SystemMode::Loop => {
                    let max = args.max_iterations.unwrap_or(DEFAULT_LOOP_ITERATIONS);
                    record.kind = AgentKind::LoopAgent;
                    record.max_iterations = Some(max);
                    let agent = LoopAgent::new(&name, subs, Some(max))
                        .with_description(format!("Runs {count} sub-agents in a loop"));
                    workflow_entry(Arc::new(agent), record)
                }
            };
            state.insert_agent(entry).await;

            Ok(Envelope::Success(json!({
                "status": "success",
                "message": format!("Successfully created multi-agent system '{name}'"),
                "coordinator": {
                    "name": name,
                    "model": model,
                    "sub_agents": args.sub_agents,
                    "sub_agent_count": count,
                    "mode": args.mode.as_str(),
                }
            })))
        })
    }
}

fn workflow_entry(agent: SharedAgent, record: AgentRecord) -> AgentEntry {
    AgentEntry {
        agent,
        llm: None,
        record,
    }
}

#[derive(Debug, Deserialize)]
struct AddMcpToolsArgs {
    agent_name: String,
    mcp_server_command: String,
    mcp_server_args: Vec<String>,
    tool_filter: Option<Vec<String>>,
}

pub struct AddMcpTools;

impl Operation for AddMcpTools {
    fn name(&self) -> &'static str {
        "add_mcp_tools_to_agent"
    }

    fn description(&self) -> &'static str {
        "Add MCP tools from external servers to an existing ADK agent"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "agent_name": {
                    "type": "string",
                    "description": "Name of the agent to add tools to"
                },
                "mcp_server_command": {
                    "type": "string",
                    "description": "Command to run the MCP server (e.g., 'npx')"
                },
                "mcp_server_args": {
                    "type": "array",
                    "description": "Arguments for the MCP server command",
                    "items": {"type": "string"}
                },
                "tool_filter": {
                    "type": "array",
                    "description": "Optional list of specific tools to include",
                    "items": {"type": "string"},
                    "default": []
                }
            },
            "required": ["agent_name", "mcp_server_command", "mcp_server_args"]
        })
    }

    fn call<'a>(&'a self, state: &'a ServerState, args: Value) -> OpFut<'a> {
        Box::pin(async move {
            let args: AddMcpToolsArgs = parse_args(args)?;
            let Some(entry) = state.agent(&args.agent_name).await else {
                return Ok(agent_not_found(&args.agent_name));
            };
            let Some(llm) = entry.llm else {
                return Ok(Envelope::failure(format!(
                    "Failed to add MCP tools: agent '{}' does not call a model",
                    args.agent_name
                )));
            };

            // An empty filter exposes every tool.
            let filter = args.tool_filter.clone().filter(|f| !f.is_empty());
            let params = McpServerParams {
                command: args.mcp_server_command.clone(),
                args: args.mcp_server_args.clone(),
                filter,
            };
            let toolset = McpToolset::new(params, state.settings().mcp_request_timeout);
            match toolset.tools().await {
                Ok(tools) => {
                    tracing::info!(
                        agent = %args.agent_name,
                        server = %toolset.label(),
                        count = tools.len(),
                        "Attached MCP toolset"
                    );
                }
                Err(e) => {
                    tracing::error!(agent = %args.agent_name, %e, "Error adding MCP tools");
                    toolset.close().await;
                    return Ok(Envelope::failure(format!("Failed to add MCP tools: {e}")));
                }
            }
            llm.add_toolset(Arc::new(toolset)).await;

            let echoed = McpServerParams {
                command: args.mcp_server_command,
                args: args.mcp_server_args,
                filter: args.tool_filter,
            };
            state
                .update_record(&args.agent_name, |record| {
                    record.mcp_tools = Some(echoed.clone());
                })
                .await;

            Ok(Envelope::Success(json!({
                "status": "success",
                "message": format!("Successfully added MCP tools to agent '{}'", args.agent_name),
                "mcp_server": echoed,
            })))
        })
    }
}
