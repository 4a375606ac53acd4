//! A minimal agent framework.
//!
//! # Architecture
//!
//! An [`Agent`] runs against an [`InvocationContext`] and communicates only
//! by emitting [`Event`](adk_mcp_types::Event)s: every event is appended to
//! the session and forwarded to the [`Runner`] that started the invocation.
//!
//! - [`LlmAgent`] - calls a model, executes the tools it asks for, may hand
//!   off to a sub-agent
//! - [`SequentialAgent`], [`ParallelAgent`], [`LoopAgent`] - composition
//! - [`AgentTool`] - exposes an agent to another agent as a tool
//! - [`InMemorySessionService`] - session history and state
//! - [`evaluate`] - substring-based test-case evaluation

pub mod agent_tool;
pub mod context;
pub mod evaluation;
pub mod llm_agent;
pub mod loop_agent;
pub mod parallel;
pub mod runner;
pub mod sequential;
pub mod session;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use adk_mcp_providers::ModelError;
use adk_mcp_tools::ToolError;

pub use agent_tool::AgentTool;
pub use context::{DEFAULT_MAX_LLM_CALLS, InvocationContext, RunConfig};
pub use evaluation::{CaseResult, EvaluationReport, TestCase, evaluate};
pub use llm_agent::LlmAgent;
pub use loop_agent::LoopAgent;
pub use parallel::ParallelAgent;
pub use runner::Runner;
pub use sequential::SequentialAgent;
pub use session::{InMemorySessionService, Session, SessionError, SessionKey};

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error("Max number of llm calls limit of `{0}` exceeded")]
    LlmCallLimit(usize),
    #[error("Agent '{from}' cannot transfer to unknown agent '{to}'")]
    UnknownTransferTarget { from: String, to: String },
}

pub type AgentFut<'a> = Pin<Box<dyn Future<Output = Result<(), AgentError>> + Send + 'a>>;

pub type SharedAgent = Arc<dyn Agent>;

pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn sub_agents(&self) -> &[SharedAgent];

    /// Run to completion, emitting events through `ctx`.
    fn run<'a>(&'a self, ctx: &'a InvocationContext) -> AgentFut<'a>;
}
