//! Widget session storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::error::SessionStoreError;

/// A short-lived browser session bound to `(tenant, origin)`.
///
/// Immutable after creation; expiry is checked on every use, so a session
/// is invalid from `expires_at` on regardless of reap timing.
#[derive(Debug, Clone)]
pub struct WidgetSession {
    /// Opaque 128-bit session token.
    pub id: Uuid,
    /// Tenant the session acts for.
    pub tenant_id: Uuid,
    /// Normalized `scheme://host` origin the session was issued to.
    pub origin: String,
    /// Hard expiry.
    pub expires_at: DateTime<Utc>,
    /// Issuance time.
    pub created_at: DateTime<Utc>,
}

impl WidgetSession {
    /// Returns `true` once the session lifetime has passed.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Async interface over widget session persistence.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persists a new session.
    async fn create(&self, session: WidgetSession) -> Result<(), SessionStoreError>;

    /// Fetches a session by id.
    async fn get(&self, id: Uuid) -> Result<Option<WidgetSession>, SessionStoreError>;

    /// Deletes sessions past expiry. Returns how many were removed.
    async fn delete_expired(&self) -> Result<u64, SessionStoreError>;
}

/// Postgres-backed session store.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    /// Creates a store over `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    tenant_id: Uuid,
    origin: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, session: WidgetSession) -> Result<(), SessionStoreError> {
        sqlx::query(
            "INSERT INTO widget_sessions (id, tenant_id, origin, expires_at, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(session.id)
        .bind(session.tenant_id)
        .bind(&session.origin)
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<WidgetSession>, SessionStoreError> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT id, tenant_id, origin, expires_at, created_at \
             FROM widget_sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| WidgetSession {
            id: r.id,
            tenant_id: r.tenant_id,
            origin: r.origin,
            expires_at: r.expires_at,
            created_at: r.created_at,
        }))
    }

    async fn delete_expired(&self) -> Result<u64, SessionStoreError> {
        let result = sqlx::query("DELETE FROM widget_sessions WHERE expires_at < $1")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(any(test, feature = "mock"))]
pub use mock::MockSessionStore;

#[cfg(any(test, feature = "mock"))]
mod mock {
    use super::*;
    use parking_lot::RwLock;
    use std::collections::HashMap;

    /// In-memory session store for tests.
    #[derive(Default)]
    pub struct MockSessionStore {
        sessions: RwLock<HashMap<Uuid, WidgetSession>>,
    }

    impl MockSessionStore {
        /// Creates an empty store.
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of stored sessions (expired included until reaped).
        pub fn len(&self) -> usize {
            self.sessions.read().len()
        }

        /// Rewrites a session's expiry, for expiry tests.
        pub fn force_expiry(&self, id: Uuid, expires_at: DateTime<Utc>) {
            if let Some(session) = self.sessions.write().get_mut(&id) {
                session.expires_at = expires_at;
            }
        }
    }

    #[async_trait]
    impl SessionStore for MockSessionStore {
        async fn create(&self, session: WidgetSession) -> Result<(), SessionStoreError> {
            self.sessions.write().insert(session.id, session);
            Ok(())
        }

        async fn get(&self, id: Uuid) -> Result<Option<WidgetSession>, SessionStoreError> {
            Ok(self.sessions.read().get(&id).cloned())
        }

        async fn delete_expired(&self) -> Result<u64, SessionStoreError> {
            let now = Utc::now();
            let mut sessions = self.sessions.write();
            let before = sessions.len();
            sessions.retain(|_, s| s.expires_at >= now);
            Ok((before - sessions.len()) as u64)
        }
    }
}
