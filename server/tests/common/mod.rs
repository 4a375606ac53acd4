//! Shared test utilities and fixtures

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use adk_mcp_protocol::{LineReader, LineWriter, Request};
use adk_mcp_providers::{LlmRequest, LlmResponse, ModelBackend, ModelFut};
use adk_mcp_server::{McpServer, ServerState, Settings, builtin_registry};
use adk_mcp_types::{Content, FunctionCall, Part, Role, Usage};
use serde_json::{Value, json};
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;

/// Model backend that replies from a queue and records every request.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Content>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Content>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl ModelBackend for ScriptedModel {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn generate<'a>(&'a self, request: &'a LlmRequest) -> ModelFut<'a> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request.clone());
            let content = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Content::model_text("(no more replies)"));
            Ok(LlmResponse {
                content,
                usage: Usage::default(),
                finish_reason: Some("STOP".into()),
            })
        })
    }
}

pub fn function_call(id: &str, name: &str, args: Value) -> Content {
    Content::new(
        Role::Model,
        vec![Part::FunctionCall(FunctionCall {
            id: id.into(),
            name: name.into(),
            args,
        })],
    )
}

/// Client end of a server running on an in-memory stream.
pub struct Client {
    reader: LineReader<ReadHalf<DuplexStream>>,
    writer: LineWriter<WriteHalf<DuplexStream>>,
    next_id: u64,
    pub server: JoinHandle<anyhow::Result<()>>,
}

pub fn start(backend: Arc<dyn ModelBackend>) -> Client {
    start_with(Settings::default(), backend)
}

pub fn start_with(settings: Settings, backend: Arc<dyn ModelBackend>) -> Client {
    start_state(ServerState::new(settings, backend))
}

pub fn start_state(state: ServerState) -> Client {
    let (client_io, server_io) = tokio::io::duplex(1 << 20);
    let (server_read, server_write) = tokio::io::split(server_io);
    let (client_read, client_write) = tokio::io::split(client_io);

    let server = McpServer::new(Arc::new(state), builtin_registry().unwrap());
    let handle = tokio::spawn(server.serve(server_read, server_write));

    Client {
        reader: LineReader::new(client_read),
        writer: LineWriter::new(client_write),
        next_id: 1,
        server: handle,
    }
}

impl Client {
    pub async fn send(&mut self, frame: &Value) {
        self.writer.write_frame(frame).await.unwrap();
    }

    /// Next frame written by the server.
    pub async fn recv(&mut self) -> Value {
        let line = tokio::time::timeout(std::time::Duration::from_secs(10), self.reader.read_line())
            .await
            .expect("server response timed out")
            .unwrap()
            .expect("server closed the stream");
        serde_json::from_str(&line).unwrap()
    }

    pub async fn request(&mut self, method: &str, params: Option<Value>) -> Value {
        let id = self.next_id;
        self.next_id += 1;
        let request = Request::new(id, method, params);
        self.send(&serde_json::to_value(&request).unwrap()).await;
        let response = self.recv().await;
        assert_eq!(response["id"], json!(id), "response for another request");
        response
    }

    /// `tools/call`; returns `(text content, isError)`.
    pub async fn call_text(&mut self, name: &str, arguments: Value) -> (String, bool) {
        let response = self
            .request(
                "tools/call",
                Some(json!({"name": name, "arguments": arguments})),
            )
            .await;
        let result = &response["result"];
        let text = result["content"][0]["text"]
            .as_str()
            .unwrap_or_else(|| panic!("no text content in {response}"));
        (text.to_string(), result["isError"].as_bool().unwrap())
    }

    /// `tools/call`; returns `(parsed envelope, isError)`.
    pub async fn call(&mut self, name: &str, arguments: Value) -> (Value, bool) {
        let (text, is_error) = self.call_text(name, arguments).await;
        let body = serde_json::from_str(&text)
            .unwrap_or_else(|e| panic!("envelope is not JSON ({e}): {text}"));
        (body, is_error)
    }

    pub async fn initialize(&mut self) -> Value {
        let response = self
            .request(
                "initialize",
                Some(json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": {"name": "test-client", "version": "0.0.0"}
                })),
            )
            .await;
        self.send(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .await;
        response
    }

    /// Write raw bytes, bypassing JSON framing.
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_raw(bytes).await.unwrap();
    }

    /// Close the client's write side and wait for the server to exit.
    pub async fn shutdown(mut self) -> anyhow::Result<()> {
        self.writer.shutdown().await.unwrap();
        self.server.await.unwrap()
    }
}
