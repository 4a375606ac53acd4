use crate::{Agent, AgentFut, InvocationContext, SharedAgent};

/// Runs its sub-agents in sequence, repeatedly.
///
/// Stops after `max_iterations` passes, or as soon as a sub-agent emits an
/// event with `escalate` set (see the `exit_loop` tool). A pass in which no
/// sub-agent emits anything also ends the loop, since every later pass would
/// be identical. Without a limit the loop is bounded only by the
/// invocation's model-call budget.
pub struct LoopAgent {
    name: String,
    description: String,
    sub_agents: Vec<SharedAgent>,
    max_iterations: Option<usize>,
}

impl LoopAgent {
    pub fn new(
        name: impl Into<String>,
        sub_agents: Vec<SharedAgent>,
        max_iterations: Option<usize>,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            sub_agents,
            max_iterations,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl Agent for LoopAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn sub_agents(&self) -> &[SharedAgent] {
        &self.sub_agents
    }

    fn run<'a>(&'a self, ctx: &'a InvocationContext) -> AgentFut<'a> {
        Box::pin(async move {
            let scope = ctx.escalation_scope();
            let mut iteration = 0;
            while self.max_iterations.is_none_or(|max| iteration < max) {
                let before = scope.events_emitted();
                for sub in &self.sub_agents {
                    sub.run(&scope).await?;
                    if scope.escalated() {
                        tracing::debug!(agent = %self.name, iteration, "Loop escalated");
                        return Ok(());
                    }
                }
                iteration += 1;
                if scope.events_emitted() == before {
                    tracing::debug!(agent = %self.name, iteration, "Loop pass emitted nothing");
                    return Ok(());
                }
                tokio::task::yield_now().await;
            }
            tracing::debug!(agent = %self.name, iteration, "Loop reached max iterations");
            Ok(())
        })
    }
}
