use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::models::SessionState;

/// Errors that can occur with session storage
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Two-tier session store
///
/// L1 is an in-process moka cache and always present. L2 is Redis, shared
/// across instances, and optional; without it sessions live only as long as
/// the L1 entry.
pub struct SessionStore {
    redis: Option<Arc<tokio::sync::Mutex<ConnectionManager>>>,
    l1_cache: moka::future::Cache<String, String>,
    ttl_secs: u64,
}

impl SessionStore {
    /// Create a store, connecting to Redis when a URL is given
    pub async fn connect(redis_url: Option<&str>, l1_size: u64, ttl_secs: u64) -> Result<Self, StoreError> {
        let redis = match redis_url {
            Some(url) => {
                let client = redis::Client::open(url)?;
                let manager = ConnectionManager::new(client).await?;
                tracing::info!("Session store connected to Redis");
                Some(Arc::new(tokio::sync::Mutex::new(manager)))
            }
            None => None,
        };

        Ok(Self {
            redis,
            l1_cache: Self::build_l1(l1_size, ttl_secs),
            ttl_secs,
        })
    }

    /// A store backed by the in-process cache only
    pub fn in_memory(l1_size: u64, ttl_secs: u64) -> Self {
        Self {
            redis: None,
            l1_cache: Self::build_l1(l1_size, ttl_secs),
            ttl_secs,
        }
    }

    fn build_l1(l1_size: u64, ttl_secs: u64) -> moka::future::Cache<String, String> {
        moka::future::CacheBuilder::new(l1_size)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build()
    }

    pub fn is_shared(&self) -> bool {
        self.redis.is_some()
    }

    /// Stored JSON for a session (L1 first, then L2)
    ///
    /// The raw text is returned so the caller can reconcile older layouts.
    pub async fn load_raw(&self, session_id: &str) -> Result<Option<String>, StoreError> {
        let key = SessionKey::session(session_id);

        if let Some(json) = self.l1_cache.get(&key).await {
            tracing::trace!("L1 session hit: {}", key);
            return Ok(Some(json));
        }

        let Some(redis) = &self.redis else {
            return Ok(None);
        };

        let mut conn = redis.lock().await;
        let value: Option<String> = redis::cmd("GET").arg(&key).query_async(&mut *conn).await?;
        drop(conn);

        if let Some(json) = &value {
            tracing::trace!("L2 session hit: {}", key);
            self.l1_cache.insert(key, json.clone()).await;
        }

        Ok(value)
    }

    /// Persist a session snapshot in both tiers
    pub async fn save(&self, session_id: &str, state: &SessionState) -> Result<(), StoreError> {
        let json = serde_json::to_string(state)?;
        self.save_raw(session_id, json).await
    }

    /// Persist JSON as-is, e.g. a session imported from a browser
    pub async fn save_raw(&self, session_id: &str, json: String) -> Result<(), StoreError> {
        let key = SessionKey::session(session_id);

        self.l1_cache.insert(key.clone(), json.clone()).await;

        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            let _: () = redis::cmd("SETEX")
                .arg(&key)
                .arg(self.ttl_secs)
                .arg(json)
                .query_async(&mut *conn)
                .await?;
        }

        tracing::trace!("Session saved: {}", key);
        Ok(())
    }

    /// Delete a session from both tiers
    pub async fn remove(&self, session_id: &str) -> Result<(), StoreError> {
        let key = SessionKey::session(session_id);
        self.l1_cache.invalidate(&key).await;

        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            let _: () = redis::cmd("DEL").arg(&key).query_async(&mut *conn).await?;
        }

        tracing::debug!("Session removed: {}", key);
        Ok(())
    }
}

/// Session key builder
pub struct SessionKey;

impl SessionKey {
    pub const PREFIX: &'static str = "bettermatch_session";

    pub fn session(session_id: &str) -> String {
        format!("{}:{}", Self::PREFIX, session_id)
    }
}
