// Redis Manager - shared key-value backend for resolver caches, block cursor and path dumps
// Only compiled with a live connection when the `redis` feature is enabled

use anyhow::Result;
#[cfg(feature = "redis")]
use anyhow::Context;
use async_trait::async_trait;
use log::info;
#[cfg(feature = "redis")]
use log::debug;
#[cfg(feature = "redis")]
use redis::aio::ConnectionManager;
#[cfg(feature = "redis")]
use redis::{AsyncCommands, Client};

use crate::cache::KeyValueStore;

/// Configuration for the Redis connection.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    /// Expiry applied to every write; `None` keeps keys until overwritten.
    pub ttl_secs: Option<u64>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            ttl_secs: None,
        }
    }
}

#[cfg(feature = "redis")]
#[derive(Clone)]
pub struct RedisManager {
    conn: ConnectionManager,
    config: RedisConfig,
}

#[cfg(not(feature = "redis"))]
#[derive(Clone)]
pub struct RedisManager {
    config: RedisConfig,
}

impl RedisManager {
    #[cfg(feature = "redis")]
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str()).context("Failed to create Redis client")?;

        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        info!("✅ Redis Manager connected to {}", config.url);

        Ok(Self { conn, config })
    }

    #[cfg(not(feature = "redis"))]
    pub async fn new(config: RedisConfig) -> Result<Self> {
        info!("Redis requested at {} but the feature is disabled", config.url);
        Err(anyhow::anyhow!(
            "Redis feature not enabled. Enable with 'redis' feature flag."
        ))
    }

    pub async fn new_default() -> Result<Self> {
        Self::new(RedisConfig::default()).await
    }

    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    #[cfg(feature = "redis")]
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("Redis health check failed")?;

        if pong == "PONG" {
            Ok(())
        } else {
            anyhow::bail!("Unexpected Redis response: {}", pong)
        }
    }

    #[cfg(not(feature = "redis"))]
    pub async fn health_check(&self) -> Result<()> {
        Err(anyhow::anyhow!("Redis feature not enabled"))
    }
}

#[cfg(feature = "redis")]
#[async_trait]
impl KeyValueStore for RedisManager {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn
            .get(key)
            .await
            .with_context(|| format!("Failed to GET {}", key))?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        match self.config.ttl_secs {
            Some(ttl) => conn
                .set_ex::<_, _, ()>(key, value, ttl)
                .await
                .with_context(|| format!("Failed to SETEX {}", key))?,
            None => conn
                .set::<_, _, ()>(key, value)
                .await
                .with_context(|| format!("Failed to SET {}", key))?,
        }
        debug!("💾 Cached {}", key);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

#[cfg(not(feature = "redis"))]
#[async_trait]
impl KeyValueStore for RedisManager {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(anyhow::anyhow!("Redis feature not enabled"))
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Err(anyhow::anyhow!("Redis feature not enabled"))
    }

    fn backend(&self) -> &'static str {
        "redis (disabled)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RedisConfig::default();
        assert_eq!(config.url, "redis://localhost:6379");
        assert!(config.ttl_secs.is_none());
    }

    #[tokio::test]
    #[cfg(not(feature = "redis"))]
    async fn test_disabled_feature_reports_error() {
        assert!(RedisManager::new_default().await.is_err());
    }

    #[tokio::test]
    #[cfg(feature = "redis")]
    #[ignore] // Requires Redis running
    async fn test_get_set_roundtrip() {
        let manager = RedisManager::new_default().await.unwrap();
        manager.health_check().await.unwrap();

        manager.set("uniswapv2-indexer:test", "42").await.unwrap();
        assert_eq!(
            manager.get("uniswapv2-indexer:test").await.unwrap().as_deref(),
            Some("42")
        );
        assert_eq!(manager.get("uniswapv2-indexer:missing").await.unwrap(), None);
    }
}
