//! Static information about the server and what it can attach.

use serde_json::{Map, Value, json};

use crate::operation::{Envelope, OpFut, Operation, parse_args};
use crate::state::ServerState;
use crate::{SERVER_DISPLAY_NAME, SERVER_VERSION};

pub const DOCUMENTATION_TOPICS: [&str; 4] = ["agents", "tools", "deployment", "evaluation"];

const SUPPORTED_MODELS: [&str; 3] = ["gemini-2.0-flash", "gemini-1.5-pro", "gemini-1.5-flash"];

const CAPABILITIES: [&str; 6] = [
    "Agent creation and management",
    "Multi-agent systems",
    "Tool integration (Google Search, web scraping, MCP tools)",
    "Agent evaluation",
    "Session management",
    "Real-time agent execution",
];

const DOCUMENTATION_URL: &str = "https://github.com/your-username/google-adk-mcp-server";

fn no_arguments() -> Value {
    json!({
        "type": "object",
        "properties": {},
        "additionalProperties": false
    })
}

pub struct ListAvailableTools;

impl Operation for ListAvailableTools {
    fn name(&self) -> &'static str {
        "list_available_tools"
    }

    fn description(&self) -> &'static str {
        "List all available ADK tools that can be added to agents"
    }

    fn schema(&self) -> Value {
        no_arguments()
    }

    fn call<'a>(&'a self, state: &'a ServerState, _args: Value) -> OpFut<'a> {
        Box::pin(async move {
            let mut tools = Map::new();
            for entry in state.catalog().entries() {
                tools.insert(entry.name.to_string(), json!(entry));
            }
            Ok(Envelope::Success(json!({
                "status": "success",
                "total_count": tools.len(),
                "available_tools": tools,
            })))
        })
    }
}

/// Reference notes for `topic`, matched case-insensitively.
#[must_use]
pub fn documentation(topic: &str) -> Option<Value> {
    let doc = match topic.to_lowercase().as_str() {
        "agents" => json!({
            "description": "ADK supports multiple types of agents",
            "types": [
                "LlmAgent - Basic LLM-powered agent",
                "SequentialAgent - Runs sub-agents in sequence",
                "ParallelAgent - Runs sub-agents in parallel",
                "LoopAgent - Runs sub-agents in a loop until condition met",
                "CustomAgent - Build your own agent logic"
            ],
            "features": [
                "Multi-agent systems",
                "Tool integration",
                "Memory and state management",
                "Streaming support",
                "Evaluation capabilities"
            ]
        }),
        "tools" => json!({
            "description": "ADK provides a rich ecosystem of tools",
            "categories": [
                "Built-in tools (google_search, load_web_page, etc.)",
                "Google Cloud tools (BigQuery, Vertex AI, etc.)",
                "Third-party tools (LangChain, CrewAI)",
                "MCP tools (Model Context Protocol)",
                "OpenAPI tools",
                "Custom function tools"
            ],
            "features": [
                "Authentication support",
                "Async execution",
                "Tool context and state",
                "Error handling"
            ]
        }),
        "deployment" => json!({
            "description": "ADK supports multiple deployment options",
            "options": [
                "Local development with 'adk web'",
                "Google Cloud Run",
                "Google Kubernetes Engine (GKE)",
                "Vertex AI Agent Engine"
            ],
            "features": [
                "Containerization support",
                "Environment configuration",
                "Scaling capabilities",
                "Monitoring and logging"
            ]
        }),
        "evaluation" => json!({
            "description": "ADK provides comprehensive evaluation capabilities",
            "features": [
                "Automated testing with test datasets",
                "Performance metrics",
                "Comparison between agent versions",
                "Custom evaluation criteria",
                "Integration with development workflow"
            ]
        }),
        _ => return None,
    };
    Some(doc)
}

#[derive(Debug, serde::Deserialize)]
struct TopicArgs {
    topic: String,
}

pub struct GetDocumentation;

impl Operation for GetDocumentation {
    fn name(&self) -> &'static str {
        "get_adk_documentation"
    }

    fn description(&self) -> &'static str {
        "Get information about ADK features, capabilities, and usage"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "topic": {
                    "type": "string",
                    "description": "Topic to get documentation for (agents, tools, evaluation, deployment, etc.)"
                }
            },
            "required": ["topic"]
        })
    }

    fn call<'a>(&'a self, _state: &'a ServerState, args: Value) -> OpFut<'a> {
        Box::pin(async move {
            let args: TopicArgs = parse_args(args)?;
            let body = match documentation(&args.topic) {
                Some(doc) => json!({
                    "status": "success",
                    "topic": args.topic,
                    "documentation": doc,
                }),
                None => json!({
                    "status": "success",
                    "available_topics": DOCUMENTATION_TOPICS,
                    "message": format!(
                        "Topic '{}' not found. Available topics listed above.",
                        args.topic
                    ),
                }),
            };
            Ok(Envelope::Success(body))
        })
    }
}

/// `major.minor.patch[-prerelease][+build]` split into its components.
/// Components that fail to parse are reported as 0.
#[must_use]
pub fn version_info(version: &str) -> Value {
    let (rest, build) = match version.split_once('+') {
        Some((rest, build)) => (rest, Some(build)),
        None => (version, None),
    };
    let (core, prerelease) = match rest.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (rest, None),
    };
    let mut numbers = core
        .split('.')
        .map(|n| n.parse::<u64>().unwrap_or_default());
    json!({
        "major": numbers.next().unwrap_or_default(),
        "minor": numbers.next().unwrap_or_default(),
        "patch": numbers.next().unwrap_or_default(),
        "prerelease": prerelease,
        "build": build,
    })
}

pub struct GetServerVersion;

impl Operation for GetServerVersion {
    fn name(&self) -> &'static str {
        "get_server_version"
    }

    fn description(&self) -> &'static str {
        "Get version information for the Google ADK MCP Server"
    }

    fn schema(&self) -> Value {
        no_arguments()
    }

    fn call<'a>(&'a self, _state: &'a ServerState, _args: Value) -> OpFut<'a> {
        Box::pin(async move {
            Ok(Envelope::Success(json!({
                "status": "success",
                "server_name": SERVER_DISPLAY_NAME,
                "version": SERVER_VERSION,
                "version_info": version_info(SERVER_VERSION),
                "mcp_protocol": "1.0",
                "description": "MCP server exposing Google Agent Development Kit functionality",
                "capabilities": CAPABILITIES,
                "supported_models": SUPPORTED_MODELS,
                "documentation": DOCUMENTATION_URL,
            })))
        })
    }
}
