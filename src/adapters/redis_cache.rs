//! Redis-backed [`CacheStore`].
//!
//! The connection is established lazily on first use and shared through a
//! multiplexed [`ConnectionManager`], which reconnects on its own after a
//! failure. Every round trip, including the initial connect, is bounded by
//! `timeout`; failures are logged and reported as misses / `false`.
use std::{future::Future, time::Duration};

use async_trait::async_trait;
use eyre::{Result, WrapErr};
use redis::{AsyncCommands, Client, RedisError, aio::ConnectionManager};
use tokio::sync::OnceCell;

use crate::{
    config::models::RedisConfig,
    ports::cache_store::{CacheError, CacheStore},
};

impl From<RedisError> for CacheError {
    fn from(err: RedisError) -> Self {
        CacheError::Connection(err.to_string())
    }
}

pub struct RedisCacheStore {
    client: Client,
    connection: OnceCell<ConnectionManager>,
    default_ttl: Option<Duration>,
    timeout: Duration,
}

impl RedisCacheStore {
    /// Validate the connection parameters. Does not connect.
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.connection_url())
            .wrap_err_with(|| format!("Invalid Redis address {}:{}", config.host, config.port))?;

        tracing::info!(
            host = %config.host,
            port = config.port,
            db = config.db,
            timeout_ms = config.timeout_ms,
            "Configured Redis cache"
        );

        Ok(Self {
            client,
            connection: OnceCell::new(),
            default_ttl: config.default_ttl.map(Duration::from_secs),
            timeout: Duration::from_millis(config.timeout_ms),
        })
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, CacheError>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, op).await {
            Ok(result) => result.map_err(CacheError::from),
            Err(_) => Err(CacheError::Timeout(self.timeout)),
        }
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        let manager = self
            .connection
            .get_or_try_init(|| async {
                let manager = self
                    .bounded(ConnectionManager::new(self.client.clone()))
                    .await?;
                tracing::info!("Connected to Redis");
                Ok::<_, CacheError>(manager)
            })
            .await?;
        Ok(manager.clone())
    }

    async fn try_get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection().await?;
        self.bounded(conn.get(key)).await
    }

    async fn try_set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        match ttl.or(self.default_ttl) {
            Some(ttl) => {
                let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
                self.bounded(conn.pset_ex::<_, _, ()>(key, value, millis)).await
            }
            None => self.bounded(conn.set::<_, _, ()>(key, value)).await,
        }
    }

    async fn try_delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.connection().await?;
        let removed: i64 = self.bounded(conn.del(key)).await?;
        Ok(removed > 0)
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn ping(&self) -> bool {
        let result = async {
            let mut conn = self.connection().await?;
            let pong: String = self.bounded(redis::cmd("PING").query_async(&mut conn)).await?;
            Ok::<_, CacheError>(pong)
        }
        .await;

        match result {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(error = %e, "Redis ping failed");
                false
            }
        }
    }

    async fn get(&self, key: &str) -> Option<String> {
        self.try_get(key)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Redis GET failed"))
            .ok()
            .flatten()
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> bool {
        self.try_set(key, value, ttl)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Redis SET failed"))
            .is_ok()
    }

    async fn delete(&self, key: &str) -> bool {
        self.try_delete(key)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Redis DEL failed"))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_config() -> RedisConfig {
        // Nothing listens on port 1
        RedisConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            timeout_ms: 100,
            ..RedisConfig::default()
        }
    }

    #[tokio::test]
    async fn test_unreachable_redis_degrades() {
        let store = RedisCacheStore::new(&unreachable_config()).unwrap();
        assert!(!store.ping().await);
        assert!(store.get("jwt:abc").await.is_none());
        assert!(!store.set("jwt:abc", "tok", Some(Duration::from_secs(60))).await);
        assert!(!store.delete("jwt:abc").await);
    }

    #[tokio::test]
    #[ignore = "requires a Redis server on REDIS_HOST / REDIS_PORT"]
    async fn test_live_round_trip() {
        let config = crate::config::load_redis_config().unwrap();
        let store = RedisCacheStore::new(&config).unwrap();
        assert!(store.ping().await);

        let key = format!("conduit-test:{}", uuid::Uuid::new_v4());
        assert!(store.set(&key, "v", Some(Duration::from_millis(300))).await);
        assert_eq!(store.get(&key).await.as_deref(), Some("v"));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(store.get(&key).await.is_none());

        assert!(store.set(&key, "v", None).await);
        assert!(store.delete(&key).await);
        assert!(!store.delete(&key).await);
    }
}
