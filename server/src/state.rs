//! Process-wide tables shared by every operation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use adk_mcp_agents::{
    InMemorySessionService, LlmAgent, RunConfig, SessionError, SessionKey, SharedAgent,
};
use adk_mcp_providers::{GeminiBackend, ModelBackend};
use adk_mcp_tools::{McpServerParams, ToolCatalog};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use crate::config::Settings;

/// What kind of agent a table entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    LlmAgent,
    #[serde(rename = "multi_agent_coordinator")]
    Coordinator,
    SequentialAgent,
    ParallelAgent,
    LoopAgent,
}

/// The configuration an agent was created with, as reported back to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentRecord {
    pub name: String,
    pub model: String,
    pub instruction: String,
    pub description: String,
    /// Tool names as requested, including ones that could not be resolved.
    pub tools: Vec<String>,
    #[serde(rename = "type")]
    pub kind: AgentKind,
    pub sub_agents: Vec<String>,
    pub mcp_tools: Option<McpServerParams>,
    pub max_iterations: Option<usize>,
}

impl AgentRecord {
    pub fn llm(
        name: impl Into<String>,
        model: impl Into<String>,
        instruction: impl Into<String>,
        description: impl Into<String>,
        tools: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            instruction: instruction.into(),
            description: description.into(),
            tools,
            kind: AgentKind::LlmAgent,
            sub_agents: Vec::new(),
            mcp_tools: None,
            max_iterations: None,
        }
    }
}

#[derive(Clone)]
pub struct AgentEntry {
    pub agent: SharedAgent,
    /// Set when the agent is model-driven and can take more tools.
    pub llm: Option<Arc<LlmAgent>>,
    pub record: AgentRecord,
}

impl AgentEntry {
    pub fn from_llm(agent: Arc<LlmAgent>, record: AgentRecord) -> Self {
        Self {
            agent: agent.clone(),
            llm: Some(agent),
            record,
        }
    }
}

/// Agents, sessions and shared services.
pub struct ServerState {
    settings: Settings,
    backend: Arc<dyn ModelBackend>,
    catalog: ToolCatalog,
    sessions: Arc<InMemorySessionService>,
    agents: RwLock<Vec<AgentEntry>>,
    session_keys: Mutex<HashMap<String, SessionKey>>,
}

impl ServerState {
    pub fn new(settings: Settings, backend: Arc<dyn ModelBackend>) -> Self {
        let catalog = ToolCatalog::new(settings.search.clone(), settings.webpage.clone());
        Self {
            settings,
            backend,
            catalog,
            sessions: Arc::new(InMemorySessionService::new()),
            agents: RwLock::new(Vec::new()),
            session_keys: Mutex::new(HashMap::new()),
        }
    }

    /// State whose agents call Gemini with the configured key and endpoint.
    pub fn with_gemini(settings: Settings) -> Self {
        let backend = GeminiBackend::new(settings.google_api_key.clone())
            .with_api_base(settings.google_api_base.clone());
        if !backend.has_api_key() {
            tracing::warn!("No Google API key configured; agent runs will fail until one is set");
        }
        Self::new(settings, Arc::new(backend))
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn run_config(&self) -> RunConfig {
        self.settings.run_config
    }

    #[must_use]
    pub fn backend(&self) -> &Arc<dyn ModelBackend> {
        &self.backend
    }

    #[must_use]
    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn sessions(&self) -> &Arc<InMemorySessionService> {
        &self.sessions
    }

    /// Store `entry`, replacing any agent of the same name in place.
    pub async fn insert_agent(&self, entry: AgentEntry) {
        let mut agents = self.agents.write().await;
        if let Some(slot) = agents
            .iter_mut()
            .find(|existing| existing.record.name == entry.record.name)
        {
            tracing::info!(agent = %entry.record.name, "Replacing agent");
            *slot = entry;
        } else {
            tracing::info!(agent = %entry.record.name, "Registered agent");
            agents.push(entry);
        }
    }

    pub async fn agent(&self, name: &str) -> Option<AgentEntry> {
        self.agents
            .read()
            .await
            .iter()
            .find(|entry| entry.record.name == name)
            .cloned()
    }

    /// Records in insertion order.
    pub async fn agent_records(&self) -> Vec<AgentRecord> {
        self.agents
            .read()
            .await
            .iter()
            .map(|entry| entry.record.clone())
            .collect()
    }

    /// Apply `update` to the stored record of `name`. Returns false when no
    /// such agent exists.
    pub async fn update_record(&self, name: &str, update: impl FnOnce(&mut AgentRecord)) -> bool {
        let mut agents = self.agents.write().await;
        match agents.iter_mut().find(|entry| entry.record.name == name) {
            Some(entry) => {
                update(&mut entry.record);
                true
            }
            None => false,
        }
    }

    /// Release MCP toolsets held by model-driven agents.
    pub async fn shutdown(&self) {
        let agents: Vec<Arc<LlmAgent>> = self
            .agents
            .read()
            .await
            .iter()
            .filter_map(|entry| entry.llm.clone())
            .collect();
        for agent in agents {
            agent.close().await;
        }
    }

    /// Session for `(agent, session_id)`, created on first use.
    ///
    /// Sessions live in app `adk-mcp-<agent>`. Once created, a session keeps
    /// the user it was created for.
    pub async fn session_for(
        &self,
        agent_name: &str,
        session_id: &str,
        user_id: &str,
    ) -> Result<SessionKey, SessionError> {
        let table_key = format!("{agent_name}_{session_id}");
        let mut keys = self.session_keys.lock().await;
        if let Some(key) = keys.get(&table_key) {
            return Ok(key.clone());
        }

        let session = self
            .sessions
            .create_session(&app_name_for(agent_name), user_id, None, BTreeMap::new())
            .await?;
        tracing::debug!(session = %session.key, %table_key, "Created session");
        keys.insert(table_key, session.key.clone());
        Ok(session.key)
    }
}

#[must_use]
pub fn app_name_for(agent_name: &str) -> String {
    format!("adk-mcp-{agent_name}")
}

#[cfg(test)]
impl ServerState {
    pub(crate) fn for_tests() -> Self {
        Self::with_replies(Vec::new())
    }

    pub(crate) fn with_replies(replies: Vec<adk_mcp_types::Content>) -> Self {
        Self::new(
            Settings::default(),
            Arc::new(crate::testing::ScriptedModel::new(replies)),
        )
    }
}
