//! In-memory conversation sessions.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use adk_mcp_types::Event;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

/// State keys with this prefix live for one invocation and are never
/// persisted into the session.
pub const TEMP_STATE_PREFIX: &str = "temp:";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SessionKey {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
}

impl SessionKey {
    pub fn new(
        app_name: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.app_name, self.user_id, self.session_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub key: SessionKey,
    pub state: BTreeMap<String, Value>,
    pub events: Vec<Event>,
    pub last_update_time: DateTime<Utc>,
}

impl Session {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.key.session_id
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(SessionKey),
    #[error("Session already exists: {0}")]
    AlreadyExists(SessionKey),
}

/// Sessions held in process memory, keyed by `(app, user, id)`.
#[derive(Debug, Default)]
pub struct InMemorySessionService {
    sessions: RwLock<HashMap<SessionKey, Session>>,
}

impl InMemorySessionService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session. A random id is generated when `session_id` is `None`.
    pub async fn create_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: Option<String>,
        state: BTreeMap<String, Value>,
    ) -> Result<Session, SessionError> {
        let session_id = session_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let key = SessionKey::new(app_name, user_id, session_id);

        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&key) {
            return Err(SessionError::AlreadyExists(key));
        }
        let session = Session {
            key: key.clone(),
            state,
            events: Vec::new(),
            last_update_time: Utc::now(),
        };
        sessions.insert(key, session.clone());
        tracing::debug!(session = %session.key, "Created session");
        Ok(session)
    }

    pub async fn get_session(&self, key: &SessionKey) -> Option<Session> {
        self.sessions.read().await.get(key).cloned()
    }

    /// Sessions of one user, without their events, ordered by id.
    pub async fn list_sessions(&self, app_name: &str, user_id: &str) -> Vec<Session> {
        let sessions = self.sessions.read().await;
        let mut listed: Vec<Session> = sessions
            .values()
            .filter(|s| s.key.app_name == app_name && s.key.user_id == user_id)
            .map(|s| Session {
                events: Vec::new(),
                ..s.clone()
            })
            .collect();
        listed.sort_by(|a, b| a.key.session_id.cmp(&b.key.session_id));
        listed
    }

    /// Returns whether a session was removed.
    pub async fn delete_session(&self, key: &SessionKey) -> bool {
        self.sessions.write().await.remove(key).is_some()
    }

    /// Append `event` and fold its `state_delta` into the session state.
    pub async fn append_event(&self, key: &SessionKey, event: Event) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(key)
            .ok_or_else(|| SessionError::NotFound(key.clone()))?;

        for (state_key, value) in &event.actions.state_delta {
            if state_key.starts_with(TEMP_STATE_PREFIX) {
                continue;
            }
            session.state.insert(state_key.clone(), value.clone());
        }
        session.last_update_time = event.timestamp;
        session.events.push(event);
        Ok(())
    }

    pub async fn events(&self, key: &SessionKey) -> Result<Vec<Event>, SessionError> {
        self.sessions
            .read()
            .await
            .get(key)
            .map(|s| s.events.clone())
            .ok_or_else(|| SessionError::NotFound(key.clone()))
    }

    pub async fn state(&self, key: &SessionKey) -> Result<BTreeMap<String, Value>, SessionError> {
        self.sessions
            .read()
            .await
            .get(key)
            .map(|s| s.state.clone())
            .ok_or_else(|| SessionError::NotFound(key.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adk_mcp_types::{Content, EventActions};
    use serde_json::json;

    #[tokio::test]
    async fn create_and_get_session() {
        let service = InMemorySessionService::new();
        let created = service
            .create_session("app", "u1", Some("s1".into()), BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(created.id(), "s1");

        let key = SessionKey::new("app", "u1", "s1");
        let fetched = service.get_session(&key).await.unwrap();
        assert_eq!(fetched.key, key);
        assert!(fetched.events.is_empty());
    }

    #[tokio::test]
    async fn generated_ids_are_unique() {
        let service = InMemorySessionService::new();
        let a = service
            .create_session("app", "u", None, BTreeMap::new())
            .await
            .unwrap();
        let b = service
            .create_session("app", "u", None, BTreeMap::new())
            .await
            .unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn duplicate_id_rejected() {
        let service = InMemorySessionService::new();
        service
            .create_session("app", "u", Some("x".into()), BTreeMap::new())
            .await
            .unwrap();
        let err = service
            .create_session("app", "u", Some("x".into()), BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn append_applies_state_delta() {
        let service = InMemorySessionService::new();
        let mut initial = BTreeMap::new();
        initial.insert("count".to_string(), json!(1));
        let session = service
            .create_session("app", "u", None, initial)
            .await
            .unwrap();

        let mut actions = EventActions::default();
        actions.state_delta.insert("count".into(), json!(2));
        actions.state_delta.insert("topic".into(), json!("rust"));
        actions.state_delta.insert("temp:scratch".into(), json!(true));
        let event = Event::new("inv", "agent")
            .with_content(Content::model_text("ok"))
            .with_actions(actions);
        service.append_event(&session.key, event).await.unwrap();

        let state = service.state(&session.key).await.unwrap();
        assert_eq!(state["count"], json!(2));
        assert_eq!(state["topic"], json!("rust"));
        assert!(!state.contains_key("temp:scratch"));
        assert_eq!(service.events(&session.key).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn append_to_missing_session_fails() {
        let service = InMemorySessionService::new();
        let key = SessionKey::new("app", "u", "nope");
        let err = service
            .append_event(&key, Event::new("inv", "a"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Session not found: app/u/nope");
    }

    #[tokio::test]
    async fn list_and_delete() {
        let service = InMemorySessionService::new();
        for id in ["b", "a"] {
            let s = service
                .create_session("app", "u", Some(id.into()), BTreeMap::new())
                .await
                .unwrap();
            service
                .append_event(&s.key, Event::new("inv", "x"))
                .await
                .unwrap();
        }
        service
            .create_session("other", "u", Some("c".into()), BTreeMap::new())
            .await
            .unwrap();

        let listed = service.list_sessions("app", "u").await;
        let ids: Vec<&str> = listed.iter().map(Session::id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(listed.iter().all(|s| s.events.is_empty()));

        assert!(service.delete_session(&SessionKey::new("app", "u", "a")).await);
        assert!(!service.delete_session(&SessionKey::new("app", "u", "a")).await);
        assert_eq!(service.list_sessions("app", "u").await.len(), 1);
    }
}
