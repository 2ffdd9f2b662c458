// ============================================================================
// Device Stream Server - PostgreSQL Session Store
// File: crates/device-stream-server/src/session/postgres.rs
// ============================================================================

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, types::Json, FromRow, PgPool};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info};

use super::models::{Preferences, Session};
use super::store::{SessionError, SessionStore};
use crate::config::DatabaseConfig;
use crate::utils::generate_opaque_id;

pub struct PgSessionStore {
    pool: PgPool,
    ttl: chrono::Duration,
    op_timeout: Duration,
}

#[derive(Debug, FromRow)]
struct SessionRow {
    session_id: String,
    preferences: Json<Preferences>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            session_id: row.session_id,
            preferences: row.preferences.0,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}

impl PgSessionStore {
    /// Connect, verify the connection and make sure the schema exists.
    pub async fn connect(config: &DatabaseConfig, ttl: chrono::Duration) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_max_size)
            .acquire_timeout(Duration::from_secs(config.pool_timeout_seconds))
            .connect(&config.url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        let store = Self::new(pool, ttl, config.operation_timeout());
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn new(pool: PgPool, ttl: chrono::Duration, op_timeout: Duration) -> Self {
        Self {
            pool,
            ttl,
            op_timeout,
        }
    }

    /// Unique session IDs and an index on the expiry column are what keep
    /// collisions impossible and purges cheap.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS anonymous_sessions (
                id BIGSERIAL PRIMARY KEY,
                session_id TEXT NOT NULL,
                preferences JSONB NOT NULL,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL,
                expires_at TIMESTAMP WITH TIME ZONE NOT NULL,
                CONSTRAINT uq_anonymous_sessions_session_id UNIQUE (session_id)
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_anonymous_sessions_expires_at ON anonymous_sessions(expires_at)",
        )
        .execute(&self.pool)
        .await?;

        info!("Session schema ensured");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn timed<T, F>(&self, op: &'static str, fut: F) -> Result<T, SessionError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                error!("Database error during {}: {}", op, e);
                Err(SessionError::from(e))
            }
            Err(_) => {
                error!("Database timeout during {} after {:?}", op, self.op_timeout);
                Err(SessionError::Timeout)
            }
        }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create_session(&self) -> Result<String, SessionError> {
        let session = Session::new(generate_opaque_id(), self.ttl);

        self.timed(
            "create_session",
            sqlx::query(
                r#"INSERT INTO anonymous_sessions
                   (session_id, preferences, created_at, expires_at)
                   VALUES ($1, $2, $3, $4)"#,
            )
            .bind(&session.session_id)
            .bind(Json(&session.preferences))
            .bind(session.created_at)
            .bind(session.expires_at)
            .execute(&self.pool),
        )
        .await?;

        debug!("Created session row");
        Ok(session.session_id)
    }

    async fn get_session(&self, session_id: &str) -> Result<Session, SessionError> {
        let row: Option<SessionRow> = self
            .timed(
                "get_session",
                sqlx::query_as(
                    r#"SELECT session_id, preferences, created_at, expires_at
                       FROM anonymous_sessions
                       WHERE session_id = $1"#,
                )
                .bind(session_id)
                .fetch_optional(&self.pool),
            )
            .await?;

        let session: Session = row.ok_or(SessionError::NotFound)?.into();

        if session.is_expired() {
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
        let now = Utc::now();
        let updated: Option<Json<Preferences>> = self
            .timed(
                "update_session",
                sqlx::query_scalar(
                    r#"UPDATE anonymous_sessions
                       SET preferences = $2, expires_at = $3
                       WHERE session_id = $1 AND expires_at >= $4
                       RETURNING preferences"#,
                )
                .bind(session_id)
                .bind(Json(&preferences))
                .bind(now + self.ttl)
                .bind(now)
                .fetch_optional(&self.pool),
            )
            .await?;

        Ok(updated.map(|json| json.0))
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), SessionError> {
        self.timed(
            "delete_session",
            sqlx::query("DELETE FROM anonymous_sessions WHERE session_id = $1")
                .bind(session_id)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, SessionError> {
        let result = self
            .timed(
                "purge_expired",
                sqlx::query("DELETE FROM anonymous_sessions WHERE expires_at < $1")
                    .bind(Utc::now())
                    .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected())
    }
}
