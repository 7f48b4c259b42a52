//! Durable storage for users, sessions, and personal access tokens.
//!
//! Lookups return rows by hash without filtering on expiry or account state;
//! the session/token layers enforce those, so internal logs can tell
//! "expired" apart from "missing" while clients cannot.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::utils::is_unique_violation;

/// Row from the external user directory. This service only reads it.
#[derive(Clone, Debug)]
pub(crate) struct UserRecord {
    pub(crate) id: Uuid,
    pub(crate) password_hash: String,
    pub(crate) is_active: bool,
}

/// Stored browser session. `expires_at` is fixed at creation.
#[derive(Clone, Debug)]
pub(crate) struct SessionRecord {
    pub(crate) id: Uuid,
    pub(crate) user_id: Uuid,
    pub(crate) csrf_secret: String,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) expires_at: DateTime<Utc>,
}

/// Stored personal access token. Never carries the raw secret.
#[derive(Clone, Debug)]
pub(crate) struct TokenRecord {
    pub(crate) id: Uuid,
    pub(crate) user_id: Uuid,
    pub(crate) name: String,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) expires_at: Option<DateTime<Utc>>,
    pub(crate) last_used_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub(crate) trait AuthStore: Send + Sync {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>>;

    /// `false` for unknown users as well as deactivated ones.
    async fn user_is_active(&self, user_id: Uuid) -> Result<bool>;

    async fn create_session(
        &self,
        user_id: Uuid,
        session_hash: &[u8],
        csrf_secret: &str,
        ttl_seconds: i64,
    ) -> Result<SessionRecord>;

    async fn lookup_session(&self, session_hash: &[u8]) -> Result<Option<SessionRecord>>;

    /// Deleting an unknown hash is a no-op.
    async fn delete_session(&self, session_hash: &[u8]) -> Result<()>;

    async fn purge_expired_sessions(&self) -> Result<u64>;

    async fn create_token(
        &self,
        user_id: Uuid,
        name: &str,
        secret_hash: &[u8],
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<TokenRecord>;

    async fn find_token_by_hash(&self, secret_hash: &[u8]) -> Result<Option<TokenRecord>>;

    async fn list_tokens(&self, user_id: Uuid) -> Result<Vec<TokenRecord>>;

    /// Returns `false` when no row belonged to the user; revoking twice is fine.
    async fn revoke_token(&self, user_id: Uuid, token_id: Uuid) -> Result<bool>;

    /// Best-effort timestamp update after token auth; callers fire-and-forget.
    async fn touch_token_last_used(&self, token_id: Uuid) -> Result<()>;

    async fn purge_expired_tokens(&self) -> Result<u64>;
}

pub(crate) struct PgAuthStore {
    pool: PgPool,
}

impl PgAuthStore {
    #[must_use]
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthStore for PgAuthStore {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        let query = "SELECT id, password_hash, is_active FROM users WHERE username = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user by username")?;

        Ok(row.map(|row| UserRecord {
            id: row.get("id"),
            password_hash: row.get("password_hash"),
            is_active: row.get("is_active"),
        }))
    }

    async fn user_is_active(&self, user_id: Uuid) -> Result<bool> {
        let query = "SELECT is_active FROM users WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to check user status")?;

        Ok(row.is_some_and(|row| row.get("is_active")))
    }

    async fn create_session(
        &self,
        user_id: Uuid,
        session_hash: &[u8],
        csrf_secret: &str,
        ttl_seconds: i64,
    ) -> Result<SessionRecord> {
        // Both timestamps come from the same statement clock, so
        // expires_at is exactly created_at + TTL.
        let query = r"
            INSERT INTO sessions (id, user_id, session_hash, csrf_secret, expires_at)
            VALUES ($1, $2, $3, $4, NOW() + ($5 * INTERVAL '1 second'))
            RETURNING created_at, expires_at
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let id = Uuid::new_v4();
        let result = sqlx::query(query)
            .bind(id)
            .bind(user_id)
            .bind(session_hash)
            .bind(csrf_secret)
            .bind(ttl_seconds)
            .fetch_one(&self.pool)
            .instrument(span)
            .await;

        match result {
            Ok(row) => Ok(SessionRecord {
                id,
                user_id,
                csrf_secret: csrf_secret.to_string(),
                created_at: row.get("created_at"),
                expires_at: row.get("expires_at"),
            }),
            Err(err) if is_unique_violation(&err) => {
                Err(anyhow!("generated session token collided"))
            }
            Err(err) => Err(err).context("failed to insert session"),
        }
    }

    async fn lookup_session(&self, session_hash: &[u8]) -> Result<Option<SessionRecord>> {
        let query = r"
            SELECT id, user_id, csrf_secret, created_at, expires_at
            FROM sessions
            WHERE session_hash = $1
            LIMIT 1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(session_hash)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup session")?;

        Ok(row.map(|row| SessionRecord {
            id: row.get("id"),
            user_id: row.get("user_id"),
            csrf_secret: row.get("csrf_secret"),
            created_at: row.get("created_at"),
            expires_at: row.get("expires_at"),
        }))
    }

    async fn delete_session(&self, session_hash: &[u8]) -> Result<()> {
        // Logout is idempotent; it's fine if no rows are deleted.
        let query = "DELETE FROM sessions WHERE session_hash = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(session_hash)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete session")?;
        Ok(())
    }

    async fn purge_expired_sessions(&self) -> Result<u64> {
        let query = "DELETE FROM sessions WHERE expires_at < NOW()";
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
            .context("failed to purge expired sessions")?;
        Ok(result.rows_affected())
    }

    async fn create_token(
        &self,
        user_id: Uuid,
        name: &str,
        secret_hash: &[u8],
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<TokenRecord> {
        let query = r"
            INSERT INTO api_tokens (id, user_id, name, secret_hash, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING created_at
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let id = Uuid::new_v4();
        let result = sqlx::query(query)
            .bind(id)
            .bind(user_id)
            .bind(name)
            .bind(secret_hash)
            .bind(expires_at)
            .fetch_one(&self.pool)
            .instrument(span)
            .await;

        match result {
            Ok(row) => Ok(TokenRecord {
                id,
                user_id,
                name: name.to_string(),
                created_at: row.get("created_at"),
                expires_at,
                last_used_at: None,
            }),
            Err(err) if is_unique_violation(&err) => {
                Err(anyhow!("generated token secret collided"))
            }
            Err(err) => Err(err).context("failed to insert api token"),
        }
    }

    async fn find_token_by_hash(&self, secret_hash: &[u8]) -> Result<Option<TokenRecord>> {
        let query = r"
            SELECT id, user_id, name, created_at, expires_at, last_used_at
            FROM api_tokens
            WHERE secret_hash = $1
            LIMIT 1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(secret_hash)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup api token")?;

        Ok(row.map(|row| TokenRecord {
            id: row.get("id"),
            user_id: row.get("user_id"),
            name: row.get("name"),
            created_at: row.get("created_at"),
            expires_at: row.get("expires_at"),
            last_used_at: row.get("last_used_at"),
        }))
    }

    async fn list_tokens(&self, user_id: Uuid) -> Result<Vec<TokenRecord>> {
        let query = r"
            SELECT id, user_id, name, created_at, expires_at, last_used_at
            FROM api_tokens
            WHERE user_id = $1
            ORDER BY created_at DESC
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list api tokens")?;

        Ok(rows
            .into_iter()
            .map(|row| TokenRecord {
                id: row.get("id"),
                user_id: row.get("user_id"),
                name: row.get("name"),
                created_at: row.get("created_at"),
                expires_at: row.get("expires_at"),
                last_used_at: row.get("last_used_at"),
            })
            .collect())
    }

    async fn revoke_token(&self, user_id: Uuid, token_id: Uuid) -> Result<bool> {
        // Scoped to the owner so one user cannot revoke another's token.
        let query = "DELETE FROM api_tokens WHERE id = $1 AND user_id = $2";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(token_id)
            .bind(user_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to revoke api token")?;
        Ok(result.rows_affected() > 0)
    }

    async fn touch_token_last_used(&self, token_id: Uuid) -> Result<()> {
        let query = "UPDATE api_tokens SET last_used_at = NOW() WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(token_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update token last_used_at")?;
        Ok(())
    }

    async fn purge_expired_tokens(&self) -> Result<u64> {
        let query = "DELETE FROM api_tokens WHERE expires_at IS NOT NULL AND expires_at < NOW()";
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
            .context("failed to purge expired tokens")?;
        Ok(result.rows_affected())
    }
}
