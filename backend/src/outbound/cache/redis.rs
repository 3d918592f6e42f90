//! Redis-backed course cache pooled through `bb8`.

use std::time::Duration;

use async_trait::async_trait;
use bb8_redis::RedisConnectionManager;
use bb8_redis::bb8::{Pool, PooledConnection};
use bb8_redis::redis::{AsyncCommands, RedisError};
use tracing::debug;

use crate::domain::ports::{CacheKey, CourseCache, CourseCacheError};

/// Errors raised while building the Redis pool.
#[derive(Debug, thiserror::Error)]
pub enum RedisCacheError {
    #[error("invalid redis url: {0}")]
    Url(#[source] RedisError),
    #[error("failed to build redis pool: {0}")]
    Build(#[source] RedisError),
}

/// Connection settings for [`RedisCourseCache`].
#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    url: String,
    max_size: u32,
    connection_timeout: Duration,
}

impl RedisCacheConfig {
    /// Defaults: 8 connections, 2 second checkout timeout.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_size: 8,
            connection_timeout: Duration::from_secs(2),
        }
    }

    pub fn with_max_size(mut self, max_size: u32) -> Self {
        self.max_size = max_size.max(1);
        self
    }

    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// [`CourseCache`] storing entries with `SET key value EX ttl`.
#[derive(Clone)]
pub struct RedisCourseCache {
    pool: Pool<RedisConnectionManager>,
}

fn backend(cause: impl std::fmt::Display) -> CourseCacheError {
    CourseCacheError::backend(cause.to_string())
}

impl RedisCourseCache {
    /// Build the pool. Connections are opened lazily, so an unreachable
    /// server surfaces as cache errors rather than a startup failure.
    pub async fn connect(config: RedisCacheConfig) -> Result<Self, RedisCacheError> {
        let manager = RedisConnectionManager::new(config.url.as_str()).map_err(RedisCacheError::Url)?;
        let pool = Pool::builder()
            .max_size(config.max_size)
            .connection_timeout(config.connection_timeout)
            .build(manager)
            .await
            .map_err(RedisCacheError::Build)?;
        Ok(Self { pool })
    }

    async fn connection(
        &self,
    ) -> Result<PooledConnection<'_, RedisConnectionManager>, CourseCacheError> {
        self.pool.get().await.map_err(backend)
    }
}

#[async_trait]
impl CourseCache for RedisCourseCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CourseCacheError> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(key.as_str()).await.map_err(backend)?;
        Ok(value)
    }

    async fn set(&self, key: &CacheKey, value: &str, ttl: Duration) -> Result<(), CourseCacheError> {
        let seconds = ttl.as_secs().max(1);
        let mut conn = self.connection().await?;
        let () = conn.set_ex(key.as_str(), value, seconds).await.map_err(backend)?;
        Ok(())
    }

    async fn delete(&self, keys: &[CacheKey]) -> Result<(), CourseCacheError> {
        if keys.is_empty() {
            return Ok(());
        }
        let names: Vec<&str> = keys.iter().map(CacheKey::as_str).collect();
        let mut conn = self.connection().await?;
        let removed: usize = conn.del(names).await.map_err(backend)?;
        debug!(removed, "course cache keys deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn config_defaults_and_builders() {
        let config = RedisCacheConfig::new("redis://127.0.0.1:6379")
            .with_max_size(0)
            .with_connection_timeout(Duration::from_millis(500));

        assert_eq!(config.url(), "redis://127.0.0.1:6379");
        assert_eq!(config.max_size, 1);
        assert_eq!(config.connection_timeout, Duration::from_millis(500));
    }

    #[rstest]
    #[tokio::test]
    async fn malformed_urls_are_rejected() {
        let result = RedisCourseCache::connect(RedisCacheConfig::new("not a url")).await;
        assert!(matches!(result, Err(RedisCacheError::Url(_))));
    }
}
