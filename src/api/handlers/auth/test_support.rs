//! In-memory doubles for exercising auth flows without a database.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use super::password::PasswordHasher;
use super::rate_limit::RateLimiter;
use super::state::{AuthConfig, AuthState};
use super::storage::{AuthStore, SessionRecord, TokenRecord, UserRecord};

fn locked<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>> {
    mutex.lock().map_err(|_| anyhow!("{what} lock poisoned"))
}

struct UserEntry {
    username: String,
    password_hash: String,
    is_active: bool,
}

/// Hash-keyed maps mirroring the Postgres tables.
///
/// Expired rows are kept until purged, matching the real store; expiry
/// checks stay with the callers.
#[derive(Default)]
pub(crate) struct MemoryAuthStore {
    users: Mutex<HashMap<Uuid, UserEntry>>,
    sessions: Mutex<HashMap<Vec<u8>, SessionRecord>>,
    tokens: Mutex<Vec<(Vec<u8>, TokenRecord)>>,
}

impl MemoryAuthStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_user(
        &self,
        username: &str,
        password_hash: &str,
        is_active: bool,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        locked(&self.users, "users")?.insert(
            id,
            UserEntry {
                username: username.to_string(),
                password_hash: password_hash.to_string(),
                is_active,
            },
        );
        Ok(id)
    }

    pub(crate) fn set_user_active(&self, user_id: Uuid, is_active: bool) -> Result<()> {
        let mut users = locked(&self.users, "users")?;
        let entry = users
            .get_mut(&user_id)
            .ok_or_else(|| anyhow!("no such user {user_id}"))?;
        entry.is_active = is_active;
        Ok(())
    }

    pub(crate) fn session_count(&self) -> Result<usize> {
        Ok(locked(&self.sessions, "sessions")?.len())
    }

    pub(crate) fn token_count(&self) -> Result<usize> {
        Ok(locked(&self.tokens, "tokens")?.len())
    }

    pub(crate) fn token_last_used(&self, token_id: Uuid) -> Result<Option<DateTime<Utc>>> {
        let tokens = locked(&self.tokens, "tokens")?;
        let (_, record) = tokens
            .iter()
            .find(|(_, record)| record.id == token_id)
            .ok_or_else(|| anyhow!("no such token {token_id}"))?;
        Ok(record.last_used_at)
    }
}

#[async_trait]
impl AuthStore for MemoryAuthStore {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        let users = locked(&self.users, "users")?;
        Ok(users
            .iter()
            .find(|(_, entry)| entry.username == username)
            .map(|(id, entry)| UserRecord {
                id: *id,
                password_hash: entry.password_hash.clone(),
                is_active: entry.is_active,
            }))
    }

    async fn user_is_active(&self, user_id: Uuid) -> Result<bool> {
        let users = locked(&self.users, "users")?;
        Ok(users.get(&user_id).is_some_and(|entry| entry.is_active))
    }

    async fn create_session(
        &self,
        user_id: Uuid,
        session_hash: &[u8],
        csrf_secret: &str,
        ttl_seconds: i64,
    ) -> Result<SessionRecord> {
        let now = Utc::now();
        let record = SessionRecord {
            id: Uuid::new_v4(),
            user_id,
            csrf_secret: csrf_secret.to_string(),
            created_at: now,
            expires_at: now + Duration::seconds(ttl_seconds),
        };
        locked(&self.sessions, "sessions")?.insert(session_hash.to_vec(), record.clone());
        Ok(record)
    }

    async fn lookup_session(&self, session_hash: &[u8]) -> Result<Option<SessionRecord>> {
        Ok(locked(&self.sessions, "sessions")?.get(session_hash).cloned())
    }

    async fn delete_session(&self, session_hash: &[u8]) -> Result<()> {
        locked(&self.sessions, "sessions")?.remove(session_hash);
        Ok(())
    }

    async fn purge_expired_sessions(&self) -> Result<u64> {
        let mut sessions = locked(&self.sessions, "sessions")?;
        let now = Utc::now();
        let before = sessions.len();
        sessions.retain(|_, record| record.expires_at >= now);
        Ok((before - sessions.len()) as u64)
    }

    async fn create_token(
        &self,
        user_id: Uuid,
        name: &str,
        secret_hash: &[u8],
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<TokenRecord> {
        let record = TokenRecord {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            created_at: Utc::now(),
            expires_at,
            last_used_at: None,
        };
        locked(&self.tokens, "tokens")?.push((secret_hash.to_vec(), record.clone()));
        Ok(record)
    }

    async fn find_token_by_hash(&self, secret_hash: &[u8]) -> Result<Option<TokenRecord>> {
        Ok(locked(&self.tokens, "tokens")?
            .iter()
            .find(|(hash, _)| hash.as_slice() == secret_hash)
            .map(|(_, record)| record.clone()))
    }

    async fn list_tokens(&self, user_id: Uuid) -> Result<Vec<TokenRecord>> {
        Ok(locked(&self.tokens, "tokens")?
            .iter()
            .filter(|(_, record)| record.user_id == user_id)
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn revoke_token(&self, user_id: Uuid, token_id: Uuid) -> Result<bool> {
        let mut tokens = locked(&self.tokens, "tokens")?;
        let before = tokens.len();
        tokens.retain(|(_, record)| !(record.id == token_id && record.user_id == user_id));
        Ok(tokens.len() < before)
    }

    async fn touch_token_last_used(&self, token_id: Uuid) -> Result<()> {
        let mut tokens = locked(&self.tokens, "tokens")?;
        if let Some((_, record)) = tokens.iter_mut().find(|(_, record)| record.id == token_id) {
            record.last_used_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn purge_expired_tokens(&self) -> Result<u64> {
        let mut tokens = locked(&self.tokens, "tokens")?;
        let now = Utc::now();
        let before = tokens.len();
        tokens.retain(|(_, record)| !record.expires_at.is_some_and(|at| at < now));
        Ok((before - tokens.len()) as u64)
    }
}

/// Store whose every call fails, for exercising fail-closed paths.
pub(crate) struct FailingAuthStore;

#[async_trait]
impl AuthStore for FailingAuthStore {
    async fn find_user_by_username(&self, _username: &str) -> Result<Option<UserRecord>> {
        Err(anyhow!("storage offline"))
    }

    async fn user_is_active(&self, _user_id: Uuid) -> Result<bool> {
        Err(anyhow!("storage offline"))
    }

    async fn create_session(
        &self,
        _user_id: Uuid,
        _session_hash: &[u8],
        _csrf_secret: &str,
        _ttl_seconds: i64,
    ) -> Result<SessionRecord> {
        Err(anyhow!("storage offline"))
    }

    async fn lookup_session(&self, _session_hash: &[u8]) -> Result<Option<SessionRecord>> {
        Err(anyhow!("storage offline"))
    }

    async fn delete_session(&self, _session_hash: &[u8]) -> Result<()> {
        Err(anyhow!("storage offline"))
    }

    async fn purge_expired_sessions(&self) -> Result<u64> {
        Err(anyhow!("storage offline"))
    }

    async fn create_token(
        &self,
        _user_id: Uuid,
        _name: &str,
        _secret_hash: &[u8],
        _expires_at: Option<DateTime<Utc>>,
    ) -> Result<TokenRecord> {
        Err(anyhow!("storage offline"))
    }

    async fn find_token_by_hash(&self, _secret_hash: &[u8]) -> Result<Option<TokenRecord>> {
        Err(anyhow!("storage offline"))
    }

    async fn list_tokens(&self, _user_id: Uuid) -> Result<Vec<TokenRecord>> {
        Err(anyhow!("storage offline"))
    }

    async fn revoke_token(&self, _user_id: Uuid, _token_id: Uuid) -> Result<bool> {
        Err(anyhow!("storage offline"))
    }

    async fn touch_token_last_used(&self, _token_id: Uuid) -> Result<()> {
        Err(anyhow!("storage offline"))
    }

    async fn purge_expired_tokens(&self) -> Result<u64> {
        Err(anyhow!("storage offline"))
    }
}

/// Hasher that skips real key derivation and counts verification calls.
pub(crate) struct CountingHasher {
    calls: AtomicUsize,
    verdict: bool,
}

impl CountingHasher {
    pub(crate) fn accepting() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            verdict: true,
        }
    }

    pub(crate) fn rejecting() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            verdict: false,
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PasswordHasher for CountingHasher {
    fn hash(&self, _password: &str) -> Result<String> {
        Ok("$argon2id$stub".to_string())
    }

    fn verify(&self, _encoded_hash: &str, _password: &str) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.verdict
    }

    fn verify_login(&self, _encoded_hash: Option<&str>, _password: &str) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.verdict
    }
}

pub(crate) fn state_with(
    store: Arc<impl AuthStore + 'static>,
    hasher: Arc<impl PasswordHasher + 'static>,
    rate_limiter: Arc<impl RateLimiter + 'static>,
) -> Arc<AuthState> {
    let config = AuthConfig::new("http://localhost:5173".to_string());
    Arc::new(AuthState::new(config, store, hasher, rate_limiter))
}
