use futures_util::future::try_join_all;

use crate::{Agent, AgentFut, InvocationContext, SharedAgent};

/// Runs its sub-agents concurrently, each in its own branch.
///
/// Sub-agents cannot see each other's events. Events reach the runner in the
/// order they are emitted, so a fast branch's output precedes a slow one's
/// regardless of declaration order. The first failing branch fails the
/// whole agent.
pub struct ParallelAgent {
    name: String,
    description: String,
    sub_agents: Vec<SharedAgent>,
}

impl ParallelAgent {
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

impl Agent for ParallelAgent {
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
            let branches: Vec<(InvocationContext, &SharedAgent)> = self
                .sub_agents
                .iter()
                .map(|sub| (ctx.for_branch(&self.name, sub.name()), sub))
                .collect();

            try_join_all(
                branches
                    .iter()
                    .map(|(branch_ctx, sub)| sub.run(branch_ctx)),
            )
            .await?;
            Ok(())
        })
    }
}
