use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

use crate::error::RepoError;

/// Sessions expire 24 hours after login/registration.
pub fn session_ttl() -> Duration {
    Duration::hours(24)
}

/// Session
///
/// Server-side session record. The cookie only carries a signed reference to `id`.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// SessionStore
///
/// Server-side session storage. `get` never returns an expired session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, user_id: Uuid) -> Result<Session, RepoError>;
    async fn get(&self, id: Uuid) -> Option<Session>;
    // Idempotent: destroying an unknown session is not an error.
    async fn destroy(&self, id: Uuid) -> Result<(), RepoError>;
}

pub type SessionState = Arc<dyn SessionStore>;

/// PostgresSessionStore
///
/// Stores sessions in the `sessions` table next to the application data.
pub struct PostgresSessionStore {
    pool: PgPool,
}

impl PostgresSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Deletes expired rows. Called periodically from `main`.
    pub async fn purge_expired(&self) -> Result<u64, RepoError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SessionStore for PostgresSessionStore {
    async fn create(&self, user_id: Uuid) -> Result<Session, RepoError> {
        let session = sqlx::query_as::<_, Session>(
            "INSERT INTO sessions (id, user_id, expires_at) VALUES ($1, $2, $3) \
             RETURNING id, user_id, expires_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(Utc::now() + session_ttl())
        .fetch_one(&self.pool)
        .await?;
        Ok(session)
    }

    async fn get(&self, id: Uuid) -> Option<Session> {
        sqlx::query_as::<_, Session>(
            "SELECT id, user_id, expires_at FROM sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("session lookup error: {:?}", e);
            None
        })
    }

    async fn destroy(&self, id: Uuid) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// MemorySessionStore
///
/// Process-local session store for tests and database-less runs.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts a session as-is. Lets tests plant expired sessions.
    pub fn insert(&self, session: Session) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session.id, session);
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, user_id: Uuid) -> Result<Session, RepoError> {
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            expires_at: Utc::now() + session_ttl(),
        };
        self.insert(session.clone());
        Ok(session)
    }

    async fn get(&self, id: Uuid) -> Option<Session> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions
            .get(&id)
            .filter(|s| !s.is_expired(Utc::now()))
            .cloned()
    }

    async fn destroy(&self, id: Uuid) -> Result<(), RepoError> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        Ok(())
    }
}
