use std::collections::HashMap;

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::session::Session,
};

/// Server-side session storage keyed by the `session_id` cookie.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stores a session and returns its id.
    async fn create(&self, session: &Session) -> Result<Uuid>;

    /// Loads a live session. Expired sessions are removed and reported as absent.
    async fn get(&self, session_id: Uuid) -> Result<Option<Session>>;

    /// Removes a session. Removing an unknown id is not an error.
    async fn delete(&self, session_id: Uuid) -> Result<()>;
}

fn session_key(session_id: Uuid) -> String {
    format!("session:{}", session_id)
}

/// A `SessionStore` keeping sessions in Redis with a matching TTL.
#[derive(Clone)]
pub struct RedisSessionStore {
    redis: ConnectionManager,
}

impl RedisSessionStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let redis = ConnectionManager::new(client).await?;
        Ok(Self { redis })
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn create(&self, session: &Session) -> Result<Uuid> {
        let session_id = Uuid::new_v4();
        let session_json = sonic_rs::to_string(session)
            .map_err(|e| AppError::Internal(format!("Session serialization failed: {}", e)))?;

        let expiration_seconds = (session.expires_at - session.created_at)
            .num_seconds()
            .max(1) as u64;

        let mut redis = self.redis.clone();
        let _: () = redis
            .set_ex(session_key(session_id), &session_json, expiration_seconds)
            .await
            .map_err(|e| {
                tracing::error!("❌ Redis set_ex failed: {}", e);
                AppError::Redis(e)
            })?;

        tracing::debug!("✅ Session saved to Redis: session:{}", session_id);
        Ok(session_id)
    }

    async fn get(&self, session_id: Uuid) -> Result<Option<Session>> {
        let mut redis = self.redis.clone();
        let session_json: Option<String> = redis.get(session_key(session_id)).await?;
        let Some(session_json) = session_json else {
            return Ok(None);
        };

        let session: Session = match sonic_rs::from_str(&session_json) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("❌ Invalid session JSON: {}", e);
                return Ok(None);
            }
        };

        if session.is_expired() {
            tracing::warn!("❌ Session expired for user: {}", session.username);
            self.delete(session_id).await?;
            return Ok(None);
        }

        Ok(Some(session))
    }

    async fn delete(&self, session_id: Uuid) -> Result<()> {
        let mut redis = self.redis.clone();
        let _: () = redis.del(session_key(session_id)).await?;
        Ok(())
    }
}

/// A process-local `SessionStore`. Sessions do not survive a restart.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: &Session) -> Result<Uuid> {
        let session_id = Uuid::new_v4();
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, s| !s.is_expired());
        sessions.insert(session_id, session.clone());
        Ok(session_id)
    }

    async fn get(&self, session_id: Uuid) -> Result<Option<Session>> {
        let session = self.sessions.read().await.get(&session_id).cloned();
        match session {
            Some(session) if session.is_expired() => {
                tracing::warn!("❌ Session expired for user: {}", session.username);
                self.delete(session_id).await?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn delete(&self, session_id: Uuid) -> Result<()> {
        self.sessions.write().await.remove(&session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Role;

    #[tokio::test]
    async fn test_create_get_delete() {
        let store = MemorySessionStore::new();
        let session = Session::new("bob".to_string(), Role::Teacher, 7);
        let id = store.create(&session).await.unwrap();

        assert_eq!(store.get(id).await.unwrap(), Some(session));

        store.delete(id).await.unwrap();
        assert!(store.get(id).await.unwrap().is_none());
        store.delete(id).await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_session_is_dropped() {
        let store = MemorySessionStore::new();
        let session = Session::new("bob".to_string(), Role::Teacher, -1);
        let id = store.create(&session).await.unwrap();

        assert!(store.get(id).await.unwrap().is_none());
        assert!(store.sessions.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_create_prunes_abandoned_sessions() {
        let store = MemorySessionStore::new();
        store
            .create(&Session::new("gone".to_string(), Role::Student, -1))
            .await
            .unwrap();
        let live = store
            .create(&Session::new("bob".to_string(), Role::Teacher, 7))
            .await
            .unwrap();

        let sessions = store.sessions.read().await;
        assert_eq!(sessions.len(), 1);
        assert!(sessions.contains_key(&live));
    }

    #[tokio::test]
    async fn test_unknown_session_is_absent() {
        let store = MemorySessionStore::new();
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }
}
