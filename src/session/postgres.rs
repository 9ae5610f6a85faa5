//! `user_sessions` table access.

use super::{SessionRecord, SessionStore, MAX_SESSION_TTL_SECONDS};
use crate::storage::StoreError;
use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Clamped so `NOW() + interval` stays in range.
fn seconds(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs().min(MAX_SESSION_TTL_SECONDS)).unwrap_or(i64::MAX)
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(
        &self,
        session_hash: &[u8],
        user_id: Uuid,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        // A NULL ttl yields a NULL expires_at: the session never expires.
        let query = r"
            INSERT INTO user_sessions (session_hash, user_id, expires_at)
            VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(session_hash)
            .bind(user_id)
            .bind(ttl.map(seconds))
            .execute(&self.pool)
            .instrument(span)
            .await?;
        Ok(())
    }

    async fn lookup(
        &self,
        session_hash: &[u8],
        extend: Option<Duration>,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let row = if let Some(extend) = extend {
            // Sessions without an expiry have nothing to slide and are left as is.
            let query = r"
                UPDATE user_sessions
                SET expires_at = CASE
                    WHEN expires_at IS NULL THEN NULL
                    ELSE NOW() + ($2 * INTERVAL '1 second')
                END
                WHERE session_hash = $1
                  AND (expires_at IS NULL OR expires_at > NOW())
                RETURNING user_id
            ";
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "UPDATE",
                db.statement = query
            );
            sqlx::query(query)
                .bind(session_hash)
                .bind(seconds(extend))
                .fetch_optional(&self.pool)
                .instrument(span)
                .await
                .context("failed to lookup session")?
        } else {
            let query = r"
                SELECT user_id
                FROM user_sessions
                WHERE session_hash = $1
                  AND (expires_at IS NULL OR expires_at > NOW())
            ";
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "SELECT",
                db.statement = query
            );
            sqlx::query(query)
                .bind(session_hash)
                .fetch_optional(&self.pool)
                .instrument(span)
                .await
                .context("failed to lookup session")?
        };

        Ok(row.map(|row| SessionRecord {
            user_id: row.get("user_id"),
        }))
    }

    async fn destroy(&self, session_hash: &[u8]) -> Result<bool, StoreError> {
        let query = "DELETE FROM user_sessions WHERE session_hash = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(session_hash)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete session")?;
        Ok(result.rows_affected() > 0)
    }

    async fn prune_expired(&self) -> Result<u64, StoreError> {
        let query = "DELETE FROM user_sessions WHERE expires_at IS NOT NULL AND expires_at <= NOW()";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to prune expired sessions")?;
        Ok(result.rows_affected())
    }
}
