//! The operations this server exposes.

mod info;
mod manage;
mod run;
mod web;

use std::sync::Arc;

pub use info::{
    DOCUMENTATION_TOPICS, GetDocumentation, GetServerVersion, ListAvailableTools, documentation,
    version_info,
};
pub use manage::{AddMcpTools, CreateAgent, CreateMultiAgentSystem, GetAgentInfo, ListAgents};
pub use run::{EvaluateAgent, RunAgent};
pub use web::{LoadWebpageContent, SearchWeb};

use crate::operation::{Envelope, Operation, OperationError, OperationRegistry};

/// Registry holding every operation, in `tools/list` order.
pub fn builtin_registry() -> Result<OperationRegistry, OperationError> {
    let operations: Vec<Arc<dyn Operation>> = vec![
        Arc::new(CreateAgent),
        Arc::new(ListAgents),
        Arc::new(GetAgentInfo),
        Arc::new(RunAgent),
        Arc::new(ListAvailableTools),
        Arc::new(EvaluateAgent),
        Arc::new(CreateMultiAgentSystem),
        Arc::new(AddMcpTools),
        Arc::new(SearchWeb),
        Arc::new(LoadWebpageContent),
        Arc::new(GetDocumentation),
        Arc::new(GetServerVersion),
    ];

    let mut registry = OperationRegistry::default();
    for operation in operations {
        registry.register(operation)?;
    }
    Ok(registry)
}

pub(crate) fn agent_not_found(name: &str) -> Envelope {
    Envelope::failure(format!("Agent '{name}' not found"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_every_operation_once() {
        let registry = builtin_registry().unwrap();
        assert_eq!(
            registry.names(),
            &[
                "create_adk_agent",
                "list_adk_agents",
                "get_adk_agent_info",
                "run_adk_agent",
                "list_available_tools",
                "evaluate_adk_agent",
                "create_multi_agent_system",
                "add_mcp_tools_to_agent",
                "search_web",
                "load_webpage_content",
                "get_adk_documentation",
                "get_server_version",
            ]
        );
    }

    #[test]
    fn every_schema_compiles() {
        for definition in builtin_registry().unwrap().definitions() {
            let schema = &definition["inputSchema"];
            assert_eq!(schema["type"], "object", "{}", definition["name"]);
            assert!(
                jsonschema::validator_for(schema).is_ok(),
                "{}",
                definition["name"]
            );
        }
    }
}
