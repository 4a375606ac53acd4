//! Validated agent names.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidAgentName {
    #[error("agent name must not be empty")]
    Empty,
    #[error("agent name '{0}' must start with a letter or underscore")]
    BadStart(String),
    #[error("agent name '{0}' may only contain letters, digits and underscores")]
    BadChar(String),
    #[error("agent name 'user' is reserved")]
    Reserved,
}

/// An agent name: an identifier that is not the reserved author `user`.
///
/// Names appear in event branches joined with `.`, so dots and other
/// punctuation are rejected up front.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentName(String);

impl AgentName {
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidAgentName> {
        let name = name.into();
        let mut chars = name.chars();
        let Some(first) = chars.next() else {
            return Err(InvalidAgentName::Empty);
        };
        if !(first.is_alphabetic() || first == '_') {
            return Err(InvalidAgentName::BadStart(name));
        }
        if !chars.all(|c| c.is_alphanumeric() || c == '_') {
            return Err(InvalidAgentName::BadChar(name));
        }
        if name == crate::USER_AUTHOR {
            return Err(InvalidAgentName::Reserved);
        }
        Ok(Self(name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AgentName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AgentName {
    type Error = InvalidAgentName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AgentName> for String {
    fn from(value: AgentName) -> Self {
        value.0
    }
}
