//! Per-invocation state shared by every agent taking part in one run.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use adk_mcp_tools::DEFAULT_MAX_OUTPUT_BYTES;
use adk_mcp_types::Event;
use tokio::sync::mpsc;

use crate::AgentError;
use crate::session::{InMemorySessionService, SessionKey};

pub const DEFAULT_MAX_LLM_CALLS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    /// Model calls allowed per invocation, across all agents. Zero disables
    /// the limit.
    pub max_llm_calls: usize,
    /// Cap applied to each text tool result.
    pub max_tool_output_bytes: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_llm_calls: DEFAULT_MAX_LLM_CALLS,
            max_tool_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

/// Handle an agent runs against.
///
/// Cloning is cheap; clones share the session, the event channel and the
/// model-call budget. [`InvocationContext::for_branch`] and
/// [`InvocationContext::escalation_scope`] derive contexts for composite
/// agents.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    invocation_id: String,
    branch: Option<String>,
    session: SessionKey,
    sessions: Arc<InMemorySessionService>,
    run_config: RunConfig,
    events_tx: mpsc::UnboundedSender<Event>,
    llm_calls: Arc<AtomicUsize>,
    emitted: Arc<AtomicUsize>,
    escalated: Arc<AtomicBool>,
}

impl InvocationContext {
    pub fn new(
        invocation_id: impl Into<String>,
        session: SessionKey,
        sessions: Arc<InMemorySessionService>,
        run_config: RunConfig,
        events_tx: mpsc::UnboundedSender<Event>,
    ) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            branch: None,
            session,
            sessions,
            run_config,
            events_tx,
            llm_calls: Arc::new(AtomicUsize::new(0)),
            emitted: Arc::new(AtomicUsize::new(0)),
            escalated: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn invocation_id(&self) -> &str {
        &self.invocation_id
    }

    #[must_use]
    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    #[must_use]
    pub fn session_key(&self) -> &SessionKey {
        &self.session
    }

    #[must_use]
    pub fn sessions(&self) -> &Arc<InMemorySessionService> {
        &self.sessions
    }

    #[must_use]
    pub fn run_config(&self) -> RunConfig {
        self.run_config
    }

    /// Context for `child` running under parallel agent `parent`: its branch
    /// is `{branch}.{parent}.{child}`, or `{parent}.{child}` at the root.
    #[must_use]
    pub fn for_branch(&self, parent: &str, child: &str) -> Self {
        let suffix = format!("{parent}.{child}");
        let branch = match &self.branch {
            Some(current) => format!("{current}.{suffix}"),
            None => suffix,
        };
        Self {
            branch: Some(branch),
            ..self.clone()
        }
    }

    /// Context whose escalation flag is independent of this one's, so a loop
    /// only reacts to escalations raised inside it.
    #[must_use]
    pub fn escalation_scope(&self) -> Self {
        Self {
            escalated: Arc::new(AtomicBool::new(false)),
            ..self.clone()
        }
    }

    /// Whether an event with `escalate` set was emitted in this scope.
    #[must_use]
    pub fn escalated(&self) -> bool {
        self.escalated.load(Ordering::Acquire)
    }

    /// Events emitted so far in this invocation, across all branches.
    #[must_use]
    pub fn events_emitted(&self) -> usize {
        self.emitted.load(Ordering::Acquire)
    }

    /// New event authored by `author`, stamped with this invocation and branch.
    #[must_use]
    pub fn new_event(&self, author: &str) -> Event {
        Event::new(&self.invocation_id, author).with_branch(self.branch.clone())
    }

    /// Count one model call against the invocation budget.
    pub fn count_llm_call(&self) -> Result<(), AgentError> {
        let made = self.llm_calls.fetch_add(1, Ordering::AcqRel) + 1;
        let limit = self.run_config.max_llm_calls;
        if limit > 0 && made > limit {
            return Err(AgentError::LlmCallLimit(limit));
        }
        Ok(())
    }

    /// Persist `event` in the session, then hand it to whoever drives the run.
    pub async fn emit(&self, event: Event) -> Result<(), AgentError> {
        if event.actions.escalate {
            self.escalated.store(true, Ordering::Release);
        }
        self.sessions.append_event(&self.session, event.clone()).await?;
        self.emitted.fetch_add(1, Ordering::AcqRel);
        if self.events_tx.send(event).is_err() {
            tracing::debug!(invocation = %self.invocation_id, "Event receiver dropped");
        }
        Ok(())
    }

    /// Session history visible from this context's branch.
    pub async fn visible_history(&self) -> Result<Vec<Event>, AgentError> {
        let events = self.sessions.events(&self.session).await?;
        Ok(events
            .into_iter()
            .filter(|event| event.visible_from(self.branch()))
            .collect())
    }
}
