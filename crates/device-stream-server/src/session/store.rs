//! Session store port

use async_trait::async_trait;
use thiserror::Error;

use super::models::{Preferences, Session};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session not found")]
    NotFound,

    #[error("session expired")]
    Expired,

    #[error("session id already exists")]
    DuplicateId,

    #[error("session store unavailable: {0}")]
    Unavailable(String),

    #[error("session store timed out")]
    Timeout,
}

impl SessionError {
    /// Missing and expired sessions are the same outcome for callers.
    pub fn is_absent(&self) -> bool {
        matches!(self, SessionError::NotFound | SessionError::Expired)
    }

    /// Short reason used in logs when a session gets re-issued.
    pub fn reason(&self) -> &'static str {
        match self {
            SessionError::NotFound => "session not found",
            SessionError::Expired => "session expired",
            SessionError::DuplicateId => "session id collision",
            SessionError::Unavailable(_) | SessionError::Timeout => "session store unavailable",
        }
    }
}

impl From<sqlx::Error> for SessionError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => SessionError::DuplicateId,
            _ => SessionError::Unavailable(err.to_string()),
        }
    }
}

/// Durable, TTL-expiring storage of anonymous sessions.
///
/// Reads are authoritative for expiry: a record past `expires_at` is deleted
/// and reported as [`SessionError::Expired`] even if no purge has run.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a fresh session with default preferences and return its ID.
    async fn create_session(&self) -> Result<String, SessionError>;

    async fn get_session(&self, session_id: &str) -> Result<Session, SessionError>;

    /// Replace the preferences wholesale and push `expires_at` to now + TTL.
    /// `Ok(None)` means no live session has this ID.
    async fn update_session(
        &self,
        session_id: &str,
        preferences: Preferences,
    ) -> Result<Option<Preferences>, SessionError>;

    async fn delete_session(&self, session_id: &str) -> Result<(), SessionError>;

    /// Drop every expired record, returning how many were removed.
    async fn purge_expired(&self) -> Result<u64, SessionError>;
}
