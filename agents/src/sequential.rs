use crate::{Agent, AgentFut, InvocationContext, SharedAgent};

/// Runs its sub-agents one after another in the same branch.
pub struct SequentialAgent {
    name: String,
    description: String,
    sub_agents: Vec<SharedAgent>,
}

impl SequentialAgent {
    pub fn new(name: impl Into<String>, sub_agents: Vec<SharedAgent>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            sub_agents,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl Agent for SequentialAgent {
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
            for sub in &self.sub_agents {
                tracing::debug!(parent = %self.name, agent = %sub.name(), "Running sub-agent");
                sub.run(ctx).await?;
            }
            Ok(())
        })
    }
}
