//! Names agents can be equipped with by reference.

use std::sync::Arc;

use serde::Serialize;

use super::SharedTool;
use super::control::{EXIT_LOOP_TOOL_NAME, ExitLoopTool};
use super::search::{GOOGLE_SEARCH_TOOL_NAME, GoogleSearchConfig, GoogleSearchTool};
use super::webpage::{LOAD_WEB_PAGE_TOOL_NAME, LoadWebPageTool, WebPageConfig};

/// Prefix for tool names that wrap another agent, e.g. `agent_tool:researcher`.
pub const AGENT_TOOL_PREFIX: &str = "agent_tool:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    FunctionTool,
    AgentTool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "type")]
    pub kind: ToolKind,
}

/// The built-in tools, shared by every agent that names them.
pub struct ToolCatalog {
    google_search: Arc<GoogleSearchTool>,
    load_web_page: Arc<LoadWebPageTool>,
    exit_loop: Arc<ExitLoopTool>,
}

impl ToolCatalog {
    #[must_use]
    pub fn new(search: GoogleSearchConfig, webpage: WebPageConfig) -> Self {
        Self {
            google_search: Arc::new(GoogleSearchTool::new(search)),
            load_web_page: Arc::new(LoadWebPageTool::new(webpage)),
            exit_loop: Arc::new(ExitLoopTool),
        }
    }

    /// Executor for a built-in tool name. `agent_tool:` names are resolved by
    /// the caller, which owns the agent table.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<SharedTool> {
        match name {
            GOOGLE_SEARCH_TOOL_NAME => Some(self.google_search.clone() as SharedTool),
            LOAD_WEB_PAGE_TOOL_NAME => Some(self.load_web_page.clone() as SharedTool),
            EXIT_LOOP_TOOL_NAME => Some(self.exit_loop.clone() as SharedTool),
            _ => None,
        }
    }

    #[must_use]
    pub fn google_search(&self) -> &GoogleSearchTool {
        &self.google_search
    }

    #[must_use]
    pub fn load_web_page(&self) -> &LoadWebPageTool {
        &self.load_web_page
    }

    /// Every attachable tool, in listing order.
    #[must_use]
    pub fn entries(&self) -> Vec<CatalogEntry> {
        vec![
            CatalogEntry {
                name: GOOGLE_SEARCH_TOOL_NAME,
                description: "Search the web using Google Search API",
                kind: ToolKind::FunctionTool,
            },
            CatalogEntry {
                name: LOAD_WEB_PAGE_TOOL_NAME,
                description: "Load and extract content from web pages",
                kind: ToolKind::FunctionTool,
            },
            CatalogEntry {
                name: EXIT_LOOP_TOOL_NAME,
                description: "Exit the enclosing loop agent",
                kind: ToolKind::FunctionTool,
            },
            CatalogEntry {
                name: "agent_tool",
                description: "Tool that wraps another agent as a tool",
                kind: ToolKind::AgentTool,
            },
        ]
    }
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::new(GoogleSearchConfig::default(), WebPageConfig::default())
    }
}
