//! Session events.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Content;

/// Side effects requested while producing an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventActions {
    /// Name of the agent control should pass to next.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_to_agent: Option<String>,
    /// Stop the enclosing loop.
    #[serde(default)]
    pub escalate: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub state_delta: BTreeMap<String, Value>,
}

impl EventActions {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transfer_to_agent.is_none() && !self.escalate && self.state_delta.is_empty()
    }

    /// Fold `other` into `self`. Later transfers win; escalation is sticky.
    pub fn merge(&mut self, other: EventActions) {
        if other.transfer_to_agent.is_some() {
            self.transfer_to_agent = other.transfer_to_agent;
        }
        self.escalate |= other.escalate;
        self.state_delta.extend(other.state_delta);
    }
}

/// One entry in a session's history.
///
/// `branch` is the dotted path of agent names from the root of the
/// invocation, e.g. `root.parallel.worker`. Sibling branches of a parallel
/// agent never see each other's events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub invocation_id: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(default)]
    pub actions: EventActions,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(invocation_id: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            invocation_id: invocation_id.into(),
            author: author.into(),
            branch: None,
            content: None,
            actions: EventActions::default(),
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_branch(mut self, branch: Option<String>) -> Self {
        self.branch = branch;
        self
    }

    #[must_use]
    pub fn with_content(mut self, content: Content) -> Self {
        self.content = Some(content);
        self
    }

    #[must_use]
    pub fn with_actions(mut self, actions: EventActions) -> Self {
        self.actions = actions;
        self
    }

    /// Text of the event's content, if it carries any.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        let text = self.content.as_ref()?.text();
        (!text.is_empty()).then_some(text)
    }

    /// Whether an agent running on `branch` may see this event.
    ///
    /// Events without a branch are visible everywhere, and an agent running
    /// outside any branch sees everything. Otherwise the event's branch must
    /// equal `branch` or be one of its dotted ancestors.
    #[must_use]
    pub fn visible_from(&self, branch: Option<&str>) -> bool {
        let (Some(own), Some(current)) = (self.branch.as_deref(), branch) else {
            return true;
        };
        current == own
            || current
                .strip_prefix(own)
                .is_some_and(|rest| rest.starts_with('.'))
    }
}
