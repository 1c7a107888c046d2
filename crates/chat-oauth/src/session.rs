//! Browser session linkage.
//!
//! Sessions are keyed by the value of the [`SESSION_COOKIE`] cookie. Each
//! session carries an optional logged-in user and a typed slot map. The
//! authorization flow parks a [`PendingAuthorization`] in the
//! [`AUTHORIZATION_SLOT`] between `/authorize` and `/authorize/decide`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::authorize::PendingAuthorization;
use crate::error::SessionError;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "r_session";

/// Slot key holding the in-flight authorization request.
pub const AUTHORIZATION_SLOT: &str = "oauth2_context";

/// Snapshot of a session as seen by a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    #[must_use]
    pub const fn logged_in(&self) -> bool {
        self.user_id.is_some()
    }
}

/// A typed session slot value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionValue {
    /// Authorization request awaiting the user's decision.
    PendingAuthorization(PendingAuthorization),
    /// Free-form value written by other parts of the application.
    Text(String),
}

/// Cookie-keyed session storage.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Look up a session by cookie value. `Ok(None)` when it does not exist.
    async fn get_session(&self, token: &str) -> Result<Option<Session>, SessionError>;

    /// Write a slot, replacing any previous value.
    async fn set_value(
        &self,
        token: &str,
        key: &str,
        value: SessionValue,
    ) -> Result<(), SessionError>;

    /// Read and delete a slot in one step.
    async fn take_value(&self, token: &str, key: &str)
    -> Result<Option<SessionValue>, SessionError>;
}

struct SessionEntry {
    user_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    values: HashMap<String, SessionValue>,
}

/// In-memory session store.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new session and return its cookie value.
    pub async fn create_session(&self, user_id: Option<Uuid>) -> String {
        let token = Uuid::new_v4().simple().to_string();
        let entry = SessionEntry { user_id, created_at: Utc::now(), values: HashMap::new() };
        self.sessions.write().await.insert(token.clone(), entry);

        tracing::debug!(user_id = ?user_id, "Created new session");
        token
    }

    /// Remove a session.
    pub async fn remove_session(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    /// Get session count (for monitoring).
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl std::fmt::Debug for MemorySessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySessionStore").finish()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get_session(&self, token: &str) -> Result<Option<Session>, SessionError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(token).map(|entry| Session {
            token: token.to_string(),
            user_id: entry.user_id,
            created_at: entry.created_at,
        }))
    }

    async fn set_value(
        &self,
        token: &str,
        key: &str,
        value: SessionValue,
    ) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(token)
            .ok_or_else(|| SessionError::Backend("session vanished".to_string()))?;
        entry.values.insert(key.to_string(), value);
        Ok(())
    }

    async fn take_value(
        &self,
        token: &str,
        key: &str,
    ) -> Result<Option<SessionValue>, SessionError> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions.get_mut(token).and_then(|entry| entry.values.remove(key)))
    }
}
