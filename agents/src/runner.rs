use std::sync::Arc;

use adk_mcp_types::{Content, Event, USER_AUTHOR};
use tokio::sync::mpsc;

use crate::session::{InMemorySessionService, SessionError, SessionKey};
use crate::{AgentError, InvocationContext, RunConfig, SharedAgent};

/// Drives one agent against sessions of one app.
pub struct Runner {
    app_name: String,
    agent: SharedAgent,
    sessions: Arc<InMemorySessionService>,
    run_config: RunConfig,
}

impl Runner {
    pub fn new(
        app_name: impl Into<String>,
        agent: SharedAgent,
        sessions: Arc<InMemorySessionService>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            agent,
            sessions,
            run_config: RunConfig::default(),
        }
    }

    pub fn with_run_config(mut self, run_config: RunConfig) -> Self {
        self.run_config = run_config;
        self
    }

    /// Append `new_message` to an existing session and run the agent.
    ///
    /// Returns the events the agents emitted, in emission order; the user
    /// event is recorded in the session but not returned.
    pub async fn run(
        &self,
        user_id: &str,
        session_id: &str,
        new_message: Content,
    ) -> Result<Vec<Event>, AgentError> {
        let key = SessionKey::new(&self.app_name, user_id, session_id);
        if self.sessions.get_session(&key).await.is_none() {
            return Err(SessionError::NotFound(key).into());
        }

        let invocation_id = format!("e-{}", uuid::Uuid::new_v4());
        let user_event = Event::new(&invocation_id, USER_AUTHOR).with_content(new_message);
        self.sessions.append_event(&key, user_event).await?;

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let ctx = InvocationContext::new(
            invocation_id,
            key,
            Arc::clone(&self.sessions),
            self.run_config,
            events_tx,
        );

        tracing::info!(
            agent = %self.agent.name(),
            session = %ctx.session_key(),
            invocation = %ctx.invocation_id(),
            "Running agent"
        );
        let result = self.agent.run(&ctx).await;
        drop(ctx);

        let mut events = Vec::new();
        while let Ok(event) = events_rx.try_recv() {
            events.push(event);
        }

        match result {
            Ok(()) => {
                tracing::info!(agent = %self.agent.name(), events = events.len(), "Agent finished");
                Ok(events)
            }
            Err(e) => {
                tracing::warn!(agent = %self.agent.name(), events = events.len(), %e, "Agent failed");
                Err(e)
            }
        }
    }
}

/// Every text part of every event, concatenated in order.
#[must_use]
pub fn response_text(events: &[Event]) -> String {
    events
        .iter()
        .filter_map(|event| event.content.as_ref())
        .map(Content::text)
        .collect()
}
