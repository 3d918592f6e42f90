//! Port interface for the advisory course read-model cache.
use std::time::Duration;

use async_trait::async_trait;

use super::{CacheKey, define_port_error};

define_port_error! {
    /// Errors surfaced by the caching adapter.
    pub enum CourseCacheError {
        /// Cache backend is unavailable or timing out.
        Backend { message: String } => "course cache backend failure: {message}",
        /// Serialisation or deserialisation of cached content failed.
        Serialization { message: String } => "course cache serialisation failed: {message}",
    }
}

/// Key/value cache of serialised course read models.
///
/// Values are derived from committed state only. Callers treat every error
/// as a miss.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CourseCache: Send + Sync {
    /// Read a cached value.
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CourseCacheError>;

    /// Store a value that expires after `ttl`.
    async fn set(&self, key: &CacheKey, value: &str, ttl: Duration) -> Result<(), CourseCacheError>;

    /// Remove keys; missing keys are ignored.
    async fn delete(&self, keys: &[CacheKey]) -> Result<(), CourseCacheError>;
}
