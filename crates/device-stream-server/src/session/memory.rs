use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use super::models::{Preferences, Session};
use super::store::{SessionError, SessionStore};
use crate::utils::generate_opaque_id;

/// In-process session store with the same contract as the Postgres one.
///
/// Used for `database.backend = "memory"` and in tests.
#[derive(Clone)]
pub struct MemorySessionStore {
    sessions: Arc<DashMap<String, Session>>,
    ttl: chrono::Duration,
}

impl MemorySessionStore {
    pub fn new(ttl: chrono::Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Store a session as-is, refusing to overwrite an existing ID.
    pub fn insert(&self, session: Session) -> Result<(), SessionError> {
        match self.sessions.entry(session.session_id.clone()) {
            Entry::Occupied(_) => Err(SessionError::DuplicateId),
            Entry::Vacant(slot) => {
                slot.insert(session);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_session(&self) -> Result<String, SessionError> {
        let session = Session::new(generate_opaque_id(), self.ttl);
        let session_id = session.session_id.clone();
        self.insert(session)?;
        debug!("Created session (memory store)");
        Ok(session_id)
    }

    async fn get_session(&self, session_id: &str) -> Result<Session, SessionError> {
        let entry = self.sessions.get(session_id).ok_or(SessionError::NotFound)?;
        let session = entry.value().clone();

        if session.is_expired() {
            drop(entry);
            self.delete_session(session_id).await?;
            return Err(SessionError::Expired);
        }

        Ok(session)
    }

    async fn update_session(
        &self,
        session_id: &str,
        preferences: Preferences,
    ) -> Result<Option<Preferences>, SessionError> {
        let Some(mut entry) = self.sessions.get_mut(session_id) else {
            return Ok(None);
        };

        let now = Utc::now();
        if entry.is_expired_at(now) {
            return Ok(None);
        }

        entry.preferences = preferences;
        entry.expires_at = now + self.ttl;
        Ok(Some(entry.preferences.clone()))
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), SessionError> {
        self.sessions.remove(session_id);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, SessionError> {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.is_expired_at(now));
        Ok(before.saturating_sub(self.sessions.len()) as u64)
    }
}
