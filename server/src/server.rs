//! MCP request loop.

use std::sync::Arc;

use adk_mcp_protocol::{
    Incoming, LineReader, LineWriter, MCP_PROTOCOL_VERSION, Response, RpcError, parse_incoming,
};
use anyhow::{Context, Result};
use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::operation::OperationRegistry;
use crate::state::ServerState;
use crate::{SERVER_NAME, SERVER_VERSION};

/// Serves MCP over a line-framed byte stream.
///
/// Each request runs on its own task so a long agent run does not block
/// `ping` or listing. Responses go through a single writer task and may be
/// written out of request order.
pub struct McpServer {
    state: Arc<ServerState>,
    registry: Arc<OperationRegistry>,
}

impl McpServer {
    pub fn new(state: Arc<ServerState>, registry: OperationRegistry) -> Self {
        Self {
            state,
            registry: Arc::new(registry),
        }
    }

    #[must_use]
    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }

    pub async fn serve_stdio(self) -> Result<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Run until `reader` reaches EOF, then wait for in-flight requests.
    pub async fn serve<R, W>(self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<Response>();
        let writer_task = tokio::spawn(async move {
            let mut writer = LineWriter::new(writer);
            while let Some(response) = rx.recv().await {
                if let Err(e) = writer.write_frame(&response).await {
                    tracing::error!(error = %format!("{e:#}"), "Failed to write response");
                    return;
                }
            }
            if let Err(e) = writer.shutdown().await {
                tracing::debug!(error = %format!("{e:#}"), "Closing output failed");
            }
        });

        tracing::info!(
            server = SERVER_NAME,
            version = SERVER_VERSION,
            operations = self.registry.len(),
            "MCP server ready"
        );

        let mut reader = LineReader::new(reader);
        let mut tasks = JoinSet::new();
        loop {
            let line = match reader.read_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %format!("{e:#}"), "Unreadable input, stopping");
                    send(&tx, Response::failure(Value::Null, RpcError::parse_error(format!("{e:#}"))));
                    break;
                }
            };

            let frame: Value = match serde_json::from_str(&line) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(%e, "Malformed JSON frame");
                    send(&tx, Response::failure(Value::Null, RpcError::parse_error(e)));
                    continue;
                }
            };

            match parse_incoming(&frame) {
                Some(Incoming::Request { id, method, params }) => {
                    let state = Arc::clone(&self.state);
                    let registry = Arc::clone(&self.registry);
                    let tx = tx.clone();
                    tasks.spawn(async move {
                        let response = handle_request(&state, &registry, id, &method, params).await;
                        send(&tx, response);
                    });
                }
                Some(Incoming::Notification { method, .. }) => {
                    tracing::debug!(%method, "Notification");
                }
                Some(Incoming::Response { id, .. }) => {
                    tracing::debug!(%id, "Ignoring unsolicited response");
                }
                None => {
                    let id = frame
                        .get("id")
                        .filter(|id| id.is_string() || id.is_number())
                        .cloned()
                        .unwrap_or(Value::Null);
                    send(
                        &tx,
                        Response::failure(id, RpcError::invalid_request("not a JSON-RPC 2.0 message")),
                    );
                }
            }

            while let Some(finished) = tasks.try_join_next() {
                if let Err(e) = finished {
                    tracing::error!(%e, "Request task failed");
                }
            }
        }

        while let Some(finished) = tasks.join_next().await {
            if let Err(e) = finished {
                tracing::error!(%e, "Request task failed");
            }
        }
        drop(tx);
        writer_task.await.context("joining response writer")?;
        self.state.shutdown().await;
        tracing::info!("MCP server stopped");
        Ok(())
    }
}

fn send(tx: &mpsc::UnboundedSender<Response>, response: Response) {
    if tx.send(response).is_err() {
        tracing::debug!("Response writer closed");
    }
}

async fn handle_request(
    state: &ServerState,
    registry: &OperationRegistry,
    id: Value,
    method: &str,
    params: Option<Value>,
) -> Response {
    tracing::debug!(%id, %method, "Request");
    match method {
        "initialize" => Response::success(
            id,
            json!({
                "protocolVersion": MCP_PROTOCOL_VERSION,
                "capabilities": {"tools": {"listChanged": false}},
                "serverInfo": {"name": SERVER_NAME, "version": SERVER_VERSION},
            }),
        ),
        "ping" => Response::success(id, json!({})),
        "tools/list" => Response::success(id, json!({ "tools": registry.definitions() })),
        "tools/call" => match call_params(params) {
            Ok((name, arguments)) => {
                let result = call_tool(state, registry, &name, arguments).await;
                Response::success(id, result)
            }
            Err(error) => Response::failure(id, error),
        },
        other => Response::failure(id, RpcError::method_not_found(other)),
    }
}

fn call_params(params: Option<Value>) -> Result<(String, Option<Value>), RpcError> {
    let Some(Value::Object(mut params)) = params else {
        return Err(RpcError::invalid_params("expected an object with a tool name"));
    };
    let Some(Value::String(name)) = params.remove("name") else {
        return Err(RpcError::invalid_params("missing tool name"));
    };
    Ok((name, params.remove("arguments")))
}

/// `tools/call` result. Operation failures are reported in-band with
/// `isError` rather than as protocol errors. Envelopes are JSON text; a
/// dispatch failure (unknown operation, bad arguments) is a plain message.
async fn call_tool(
    state: &ServerState,
    registry: &OperationRegistry,
    name: &str,
    arguments: Option<Value>,
) -> Value {
    let (text, is_error) = match registry.dispatch(state, name, arguments).await {
        Ok(envelope) => (envelope.render(), envelope.is_error()),
        Err(e) => {
            tracing::error!(tool = %name, %e, "Error executing tool");
            (format!("Error executing {name}: {e}"), true)
        }
    };
    json!({
        "content": [{"type": "text", "text": text}],
        "isError": is_error,
    })
}
