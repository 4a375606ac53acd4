//! Tools served by an external MCP server over stdio.

use std::sync::Arc;
use std::time::Duration;

use adk_mcp_protocol::{McpClient, RemoteTool};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::OnceCell;

use super::{SharedTool, ToolCtx, ToolError, ToolExecutor, ToolFut, Toolset, ToolsetFut};

pub const DEFAULT_MCP_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// How to launch the server, plus which of its tools to expose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct McpServerParams {
    pub command: String,
    pub args: Vec<String>,
    /// Only these tool names are exposed; `None` exposes all of them.
    pub filter: Option<Vec<String>>,
}

/// Lazily-connected MCP server whose tools are offered to an agent.
///
/// The child process is spawned on the first call to [`Toolset::tools`] and
/// shared by every executor it yields.
pub struct McpToolset {
    params: McpServerParams,
    request_timeout: Duration,
    client: OnceCell<Arc<McpClient>>,
}

impl McpToolset {
    #[must_use]
    pub fn new(params: McpServerParams, request_timeout: Duration) -> Self {
        Self {
            params,
            request_timeout,
            client: OnceCell::new(),
        }
    }

    /// Wrap an already-initialized client.
    #[must_use]
    pub fn with_client(params: McpServerParams, client: Arc<McpClient>) -> Self {
        Self {
            params,
            request_timeout: DEFAULT_MCP_REQUEST_TIMEOUT,
            client: OnceCell::new_with(Some(client)),
        }
    }

    #[must_use]
    pub fn params(&self) -> &McpServerParams {
        &self.params
    }

    async fn client(&self) -> Result<Arc<McpClient>, ToolError> {
        self.client
            .get_or_try_init(|| async {
                McpClient::spawn(&self.params.command, &self.params.args, self.request_timeout)
                    .await
                    .map(Arc::new)
                    .map_err(|e| ToolError::failed(&self.params.command, format!("{e:#}")))
            })
            .await
            .cloned()
    }

    fn allowed(&self, name: &str) -> bool {
        self.params
            .filter
            .as_ref()
            .is_none_or(|filter| filter.iter().any(|f| f == name))
    }
}

impl Toolset for McpToolset {
    fn label(&self) -> String {
        format!("mcp:{}", self.params.command)
    }

    fn tools(&self) -> ToolsetFut<'_> {
        Box::pin(async move {
            let client = self.client().await?;
            let remote = client
                .list_tools()
                .await
                .map_err(|e| ToolError::failed(client.name(), format!("{e:#}")))?;

            let tools: Vec<SharedTool> = remote
                .into_iter()
                .filter(|tool| self.allowed(&tool.name))
                .map(|tool| {
                    Arc::new(McpTool {
                        client: Arc::clone(&client),
                        tool,
                    }) as SharedTool
                })
                .collect();
            tracing::debug!(server = %client.name(), count = tools.len(), "Resolved MCP tools");
            Ok(tools)
        })
    }

    fn close(&self) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            if let Some(client) = self.client.get() {
                client.shutdown().await;
            }
        })
    }
}

/// One remote tool. The result handed to the model is the text content of
/// the `tools/call` reply.
struct McpTool {
    client: Arc<McpClient>,
    tool: RemoteTool,
}

impl ToolExecutor for McpTool {
    fn name(&self) -> &str {
        &self.tool.name
    }

    fn description(&self) -> &str {
        self.tool.description.as_deref().unwrap_or_default()
    }

    fn schema(&self) -> Value {
        self.tool.input_schema.clone()
    }

    fn execute<'a>(&'a self, args: Value, _ctx: &'a mut ToolCtx) -> ToolFut<'a> {
        Box::pin(async move {
            let result = self
                .client
                .call_tool(&self.tool.name, args)
                .await
                .map_err(|e| ToolError::failed(&self.tool.name, format!("{e:#}")))?;
            let text = result.text();
            if result.is_error {
                return Err(ToolError::failed(&self.tool.name, text));
            }
            Ok(Value::String(text))
        })
    }
}
