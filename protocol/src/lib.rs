//! JSON-RPC plumbing for the Model Context Protocol.
//!
//! MCP's stdio transport carries one JSON-RPC message per line. This crate
//! provides the line codec, the message types shared by both directions, and
//! [`McpClient`] for talking to an MCP server running as a child process.

mod client;
mod codec;
mod message;

pub use client::{CallToolResult, McpClient, RemoteContent, RemoteTool};
pub use codec::{LineReader, LineWriter, MAX_LINE_BYTES};
pub use message::{
    Incoming, JSONRPC_VERSION, MCP_PROTOCOL_VERSION, Notification, Request, Response, RpcError,
    parse_incoming,
};
