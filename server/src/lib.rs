//! MCP server exposing the agent framework as named operations.
//!
//! [`McpServer`] speaks JSON-RPC over a line-framed stream and forwards
//! `tools/call` requests to the [`OperationRegistry`]. Operations share one
//! [`ServerState`]: the agent table, conversation sessions, the built-in tool
//! catalog and the model backend.

pub mod config;
pub mod operation;
pub mod ops;
mod server;
pub mod state;

pub use config::{ConfigError, ServerConfig, Settings};
pub use operation::{Envelope, OpFut, Operation, OperationError, OperationRegistry};
pub use ops::builtin_registry;
pub use server::McpServer;
pub use state::{AgentEntry, AgentKind, AgentRecord, ServerState};

/// Name reported in the `initialize` handshake.
pub const SERVER_NAME: &str = "google-adk-mcp-server";

/// Human-readable name reported by `get_server_version`.
pub const SERVER_DISPLAY_NAME: &str = "Google ADK MCP Server";

pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
