//! Client handle for an MCP server: owns the transport and matches replies.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc, oneshot};

use crate::codec::{LineReader, LineWriter};
use crate::message::{
    Incoming, MCP_PROTOCOL_VERSION, Notification, Request, Response, RpcError, parse_incoming,
};

const CLIENT_NAME: &str = "adk-mcp";

const SHUTDOWN_TIMEOUT_SECS: u64 = 2;

const WRITER_CHANNEL_CAPACITY: usize = 64;

/// Upper bound on `tools/list` pages followed before giving up.
const MAX_TOOL_PAGES: usize = 64;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, RpcError>>>>>;

enum WriterCommand {
    Send(Value),
    Shutdown,
}

/// A tool advertised by a remote MCP server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteTool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "inputSchema", default = "empty_object_schema")]
    pub input_schema: Value,
}

fn empty_object_schema() -> Value {
    json!({"type": "object", "properties": {}})
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RemoteContent {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<RemoteContent>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl CallToolResult {
    /// Text blocks joined by newlines; non-text blocks are dropped.
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                RemoteContent::Text { text } => Some(text.as_str()),
                RemoteContent::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Deserialize)]
struct ToolsPage {
    #[serde(default)]
    tools: Vec<RemoteTool>,
    #[serde(rename = "nextCursor", default)]
    next_cursor: Option<String>,
}

/// A connected, initialized MCP server.
///
/// Requests may be issued concurrently through `&self`; the reader task routes
/// each reply to its waiter by id.
pub struct McpClient {
    name: String,
    child: Mutex<Option<Child>>,
    writer_tx: mpsc::Sender<WriterCommand>,
    next_id: AtomicU64,
    pending: PendingMap,
    request_timeout: Duration,
    server_info: Option<Value>,
    reader_handle: tokio::task::JoinHandle<()>,
}

impl McpClient {
    /// Spawn `command` with `args` and complete the MCP handshake over its stdio.
    pub async fn spawn(command: &str, args: &[String], request_timeout: Duration) -> Result<Self> {
        let resolved_cmd =
            which::which(command).with_context(|| format!("{command} not found in PATH"))?;
        let mut cmd = Command::new(&resolved_cmd);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd.spawn().with_context(|| format!("spawning {command}"))?;
        let stdout = child.stdout.take().context("no stdout from child")?;
        let stdin = child.stdin.take().context("no stdin from child")?;

        tracing::info!(command, ?args, "started MCP server");
        Self::start(command.to_string(), stdout, stdin, Some(child), request_timeout).await
    }

    /// Complete the MCP handshake over an already-open transport.
    pub async fn connect<R, W>(
        name: impl Into<String>,
        reader: R,
        writer: W,
        request_timeout: Duration,
    ) -> Result<Self>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self::start(name.into(), reader, writer, None, request_timeout).await
    }

    async fn start<R, W>(
        name: String,
        reader: R,
        writer: W,
        child: Option<Child>,
        request_timeout: Duration,
    ) -> Result<Self>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        let (writer_tx, mut writer_rx) = mpsc::channel::<WriterCommand>(WRITER_CHANNEL_CAPACITY);
        let writer_name = name.clone();
        tokio::spawn(async move {
            let mut writer = LineWriter::new(writer);
            while let Some(cmd) = writer_rx.recv().await {
                match cmd {
                    WriterCommand::Send(frame) => {
                        if let Err(e) = writer.write_frame(&frame).await {
                            tracing::warn!(server = %writer_name, "MCP write error: {e}");
                            break;
                        }
                    }
                    WriterCommand::Shutdown => break,
                }
            }
        });

        let reader_pending = pending.clone();
        let reader_writer_tx = writer_tx.clone();
        let reader_name = name.clone();
        let reader_handle = tokio::spawn(async move {
            let mut reader = LineReader::new(reader);
            loop {
                match reader.read_line().await {
                    Ok(Some(line)) => match serde_json::from_str::<Value>(&line) {
                        Ok(frame) => {
                            Self::dispatch_frame(
                                &frame,
                                &reader_pending,
                                &reader_writer_tx,
                                &reader_name,
                            )
                            .await;
                        }
                        Err(e) => {
                            tracing::trace!(server = %reader_name, "Ignoring non-JSON line: {e}");
                        }
                    },
                    Ok(None) => {
                        tracing::info!("MCP server '{}' closed stdout", reader_name);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("MCP reader error for '{}': {e}", reader_name);
                        break;
                    }
                }
            }
            // Wake every waiter; their senders are dropped with the map entries.
            reader_pending.lock().await.clear();
        });

        let mut client = Self {
            name,
            child: Mutex::new(child),
            writer_tx,
            next_id: AtomicU64::new(1),
            pending,
            request_timeout,
            server_info: None,
            reader_handle,
        };

        client.initialize().await?;

        Ok(client)
    }

    async fn dispatch_frame(
        frame: &Value,
        pending: &Mutex<HashMap<u64, oneshot::Sender<Result<Value, RpcError>>>>,
        writer_tx: &mpsc::Sender<WriterCommand>,
        server_name: &str,
    ) {
        let Some(incoming) = parse_incoming(frame) else {
            tracing::trace!("Ignoring malformed JSON-RPC frame from '{server_name}'");
            return;
        };

        match incoming {
            Incoming::Response { id, result } => {
                let Some(id) = id.as_u64() else {
                    tracing::trace!("Ignoring response with foreign id from '{server_name}'");
                    return;
                };
                let sender = pending.lock().await.remove(&id);
                if let Some(tx) = sender {
                    let _ = tx.send(result);
                }
            }
            Incoming::Request { id, method, .. } => {
                // Servers block on unanswered requests, so everything gets a reply.
                let response = if method == "ping" {
                    Response::success(id, json!({}))
                } else {
                    tracing::debug!(
                        "MCP '{server_name}' sent request: {method}, replying method not found"
                    );
                    Response::failure(id, RpcError::method_not_found(&method))
                };
                if let Ok(frame) = serde_json::to_value(&response) {
                    let _ = writer_tx.send(WriterCommand::Send(frame)).await;
                }
            }
            Incoming::Notification { method, .. } => {
                tracing::trace!("Ignoring notification from '{server_name}': {method}");
            }
        }
    }

    async fn initialize(&mut self) -> Result<()> {
        let params = json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": CLIENT_NAME,
                "version": env!("CARGO_PKG_VERSION"),
            }
        });
        let result = self
            .send_request("initialize", Some(params))
            .await
            .with_context(|| format!("MCP initialize failed for '{}'", self.name))?;

        self.server_info = result.get("serverInfo").cloned();
        self.send_notification("notifications/initialized", None)
            .await?;

        Ok(())
    }

    async fn send_request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let request = Request::new(id, method, params);
        let frame = serde_json::to_value(&request).context("serializing request")?;
        if self
            .writer_tx
            .send(WriterCommand::Send(frame))
            .await
            .is_err()
        {
            self.pending.lock().await.remove(&id);
            bail!("writer channel closed");
        }

        let result = match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                self.pending.lock().await.remove(&id);
                bail!("MCP server '{}' went away during {method}", self.name);
            }
            Err(_) => {
                self.pending.lock().await.remove(&id);
                bail!("{method} timed out after {:?}", self.request_timeout);
            }
        };

        result.map_err(|e| anyhow!(e).context(format!("{method} rejected by '{}'", self.name)))
    }

    async fn send_notification(&self, method: &str, params: Option<Value>) -> Result<()> {
        let notification = Notification::new(method, params);
        let frame = serde_json::to_value(&notification).context("serializing notification")?;
        self.writer_tx
            .send(WriterCommand::Send(frame))
            .await
            .map_err(|_| anyhow!("writer channel closed"))?;
        Ok(())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `serverInfo.name` reported during the handshake.
    #[must_use]
    pub fn server_name(&self) -> Option<&str> {
        self.server_info.as_ref()?.get("name")?.as_str()
    }

    /// All tools the server advertises, following pagination cursors.
    pub async fn list_tools(&self) -> Result<Vec<RemoteTool>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_TOOL_PAGES {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let result = self.send_request("tools/list", params).await?;
            let page: ToolsPage =
                serde_json::from_value(result).context("parsing tools/list result")?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(tools),
            }
        }

        bail!("'{}' returned more than {MAX_TOOL_PAGES} tool pages", self.name)
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult> {
        let params = json!({ "name": name, "arguments": arguments });
        let result = self.send_request("tools/call", Some(params)).await?;
        serde_json::from_value(result).context("parsing tools/call result")
    }

    /// Close the transport and reap the child, killing it if it lingers.
    pub async fn shutdown(&self) {
        let _ = self.writer_tx.send(WriterCommand::Shutdown).await;

        let Some(mut child) = self.child.lock().await.take() else {
            return;
        };

        let wait_result =
            tokio::time::timeout(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS), child.wait()).await;

        if wait_result.is_err() {
            tracing::debug!("MCP '{}' didn't exit in time, killing", self.name);
            let _ = child.kill().await;
        }
    }
}

impl Drop for McpClient {
    fn drop(&mut self) {
        self.reader_handle.abort();
    }
}
