use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

use crate::auth::token;
use crate::error::AppError;
use crate::models::user::Role;

/// Server-held session record. The browser only ever sees the opaque id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub user_id: Option<i64>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub csrf_token: Option<String>,
    /// Unix timestamp of the last id rotation.
    pub started_at: i64,
}

impl SessionData {
    fn new() -> Self {
        Self {
            user_id: None,
            email: None,
            role: None,
            csrf_token: None,
            started_at: chrono::Utc::now().timestamp(),
        }
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<Option<SessionData>, AppError>;
    async fn save(&self, id: &str, data: &SessionData, ttl: Duration) -> Result<(), AppError>;
    async fn delete(&self, id: &str) -> Result<(), AppError>;
}

pub struct RedisSessionStore {
    client: Arc<redis::Client>,
}

impl RedisSessionStore {
    pub fn new(client: Arc<redis::Client>) -> Self {
        Self { client }
    }

    fn key(id: &str) -> String {
        format!("session:{}", id)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, id: &str) -> Result<Option<SessionData>, AppError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(Self::key(id)).await?;
        match raw {
            Some(json) => match serde_json::from_str(&json) {
                Ok(data) => Ok(Some(data)),
                Err(e) => {
                    tracing::error!("Corrupt session record {}: {}", id, e);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn save(&self, id: &str, data: &SessionData, ttl: Duration) -> Result<(), AppError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let json = serde_json::to_string(data).map_err(|e| {
            tracing::error!("Failed to serialize session {}: {}", id, e);
            AppError::InternalServerError
        })?;
        let _: () = conn.set_ex(Self::key(id), json, ttl.as_secs()).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = conn.del(Self::key(id)).await?;
        Ok(())
    }
}

/// In-memory store used by the test suites; same contract as Redis.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: Mutex<HashMap<String, (SessionData, Instant)>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &str) -> Result<Option<SessionData>, AppError> {
        let map = self.inner.lock().expect("session store poisoned");
        Ok(map
            .get(id)
            .filter(|(_, expires)| *expires > Instant::now())
            .map(|(data, _)| data.clone()))
    }

    async fn save(&self, id: &str, data: &SessionData, ttl: Duration) -> Result<(), AppError> {
        let mut map = self.inner.lock().expect("session store poisoned");
        map.insert(id.to_string(), (data.clone(), Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        let mut map = self.inner.lock().expect("session store poisoned");
        map.remove(id);
        Ok(())
    }
}

/// Per-request view of the session, handed to handlers as an extension.
/// The surrounding middleware loads it before the handler runs and persists
/// any changes exactly once after the handler returns.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    /// Id the request arrived with; `None` for a freshly created session.
    original_id: Option<String>,
    id: String,
    data: SessionData,
    dirty: bool,
    destroyed: bool,
}

/// Snapshot taken by the middleware when writing the session back.
pub struct PersistState {
    pub original_id: Option<String>,
    pub id: String,
    pub data: SessionData,
    pub dirty: bool,
    pub destroyed: bool,
}

impl SessionContext {
    pub fn fresh() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                original_id: None,
                id: token::generate(),
                data: SessionData::new(),
                dirty: true,
                destroyed: false,
            })),
        }
    }

    pub fn from_loaded(id: String, data: SessionData) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                original_id: Some(id.clone()),
                id,
                data,
                dirty: false,
                destroyed: false,
            })),
        }
    }

    pub fn id(&self) -> String {
        self.inner.lock().expect("session poisoned").id.clone()
    }

    pub fn user_id(&self) -> Option<i64> {
        self.inner.lock().expect("session poisoned").data.user_id
    }

    pub fn role(&self) -> Option<Role> {
        self.inner.lock().expect("session poisoned").data.role
    }

    pub fn email(&self) -> Option<String> {
        self.inner.lock().expect("session poisoned").data.email.clone()
    }

    pub fn set_user(&self, user_id: i64, email: &str, role: Role) {
        let mut inner = self.inner.lock().expect("session poisoned");
        inner.data.user_id = Some(user_id);
        inner.data.email = Some(email.to_string());
        inner.data.role = Some(role);
        inner.dirty = true;
    }

    pub fn clear_user(&self) {
        let mut inner = self.inner.lock().expect("session poisoned");
        inner.data.user_id = None;
        inner.data.email = None;
        inner.data.role = None;
        inner.dirty = true;
    }

    /// Replaces the session identifier, invalidating the old one on persist.
    /// Session contents survive the rotation.
    pub fn rotate(&self) {
        let mut inner = self.inner.lock().expect("session poisoned");
        inner.id = token::generate();
        inner.data.started_at = chrono::Utc::now().timestamp();
        inner.dirty = true;
    }

    pub fn needs_rotation(&self, window: Duration) -> bool {
        let inner = self.inner.lock().expect("session poisoned");
        let age = chrono::Utc::now().timestamp() - inner.data.started_at;
        age >= 0 && age as u64 >= window.as_secs()
    }

    /// Current CSRF token, generating and storing one on first use.
    pub fn csrf_token(&self) -> String {
        let mut inner = self.inner.lock().expect("session poisoned");
        if inner.destroyed {
            // A destroyed session never verifies; hand back a throwaway.
            return token::generate();
        }
        match &inner.data.csrf_token {
            Some(t) => t.clone(),
            None => {
                let t = token::generate();
                inner.data.csrf_token = Some(t.clone());
                inner.dirty = true;
                t
            }
        }
    }

    /// Token currently in the session, without generating one.
    pub fn csrf_current(&self) -> Option<String> {
        let inner = self.inner.lock().expect("session poisoned");
        if inner.destroyed {
            return None;
        }
        inner.data.csrf_token.clone()
    }

    pub fn rotate_csrf(&self) -> String {
        let mut inner = self.inner.lock().expect("session poisoned");
        let t = token::generate();
        inner.data.csrf_token = Some(t.clone());
        inner.dirty = true;
        t
    }

    /// Marks the session for deletion; all state is gone immediately.
    pub fn destroy(&self) {
        let mut inner = self.inner.lock().expect("session poisoned");
        inner.data = SessionData::new();
        inner.destroyed = true;
        inner.dirty = true;
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.lock().expect("session poisoned").destroyed
    }

    pub fn persist_state(&self) -> PersistState {
        let inner = self.inner.lock().expect("session poisoned");
        PersistState {
            original_id: inner.original_id.clone(),
            id: inner.id.clone(),
            data: inner.data.clone(),
            dirty: inner.dirty,
            destroyed: inner.destroyed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_changes_id_and_keeps_user() {
        let session = SessionContext::fresh();
        session.set_user(7, "a@example.com", Role::User);
        let before = session.id();
        session.rotate();
        assert_ne!(session.id(), before);
        assert_eq!(session.user_id(), Some(7));
    }

    #[test]
    fn destroy_clears_state() {
        let session = SessionContext::fresh();
        session.set_user(7, "a@example.com", Role::Admin);
        session.destroy();
        assert!(session.is_destroyed());
        assert_eq!(session.user_id(), None);
        assert_eq!(session.csrf_current(), None);
    }

    #[test]
    fn csrf_token_is_stable_until_rotated() {
        let session = SessionContext::fresh();
        let first = session.csrf_token();
        assert_eq!(session.csrf_token(), first);
        let rotated = session.rotate_csrf();
        assert_ne!(rotated, first);
        assert_eq!(session.csrf_token(), rotated);
    }

    #[tokio::test]
    async fn memory_store_round_trip_and_expiry() {
        let store = MemorySessionStore::new();
        let mut data = SessionData::new();
        data.user_id = Some(1);
        store.save("sid", &data, Duration::from_secs(60)).await.unwrap();
        let loaded = store.load("sid").await.unwrap().unwrap();
        assert_eq!(loaded.user_id, Some(1));

        store.save("gone", &data, Duration::from_secs(0)).await.unwrap();
        assert!(store.load("gone").await.unwrap().is_none());

        store.delete("sid").await.unwrap();
        assert!(store.load("sid").await.unwrap().is_none());
    }
}
