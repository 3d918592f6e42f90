//! In-process course cache with per-entry expiry.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::domain::ports::{CacheKey, CourseCache, CourseCacheError};

/// Mutex-guarded map of key to value and expiry instant.
#[derive(Debug, Default)]
pub struct MemoryCourseCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryCourseCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, (String, Instant)>>, CourseCacheError> {
        self.entries
            .lock()
            .map_err(|_| CourseCacheError::backend("memory cache mutex poisoned"))
    }

    /// Live entries, after dropping expired ones.
    pub fn len(&self) -> Result<usize, CourseCacheError> {
        let now = Instant::now();
        let mut entries = self.entries()?;
        entries.retain(|_, (_, expires)| *expires > now);
        Ok(entries.len())
    }

    pub fn is_empty(&self) -> Result<bool, CourseCacheError> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl CourseCache for MemoryCourseCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CourseCacheError> {
        let mut entries = self.entries()?;
        match entries.get(key.as_str()) {
            Some((value, expires)) if *expires > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key.as_str());
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &CacheKey, value: &str, ttl: Duration) -> Result<(), CourseCacheError> {
        let expires = Instant::now() + ttl;
        self.entries()?
            .insert(key.as_str().to_owned(), (value.to_owned(), expires));
        Ok(())
    }

    async fn delete(&self, keys: &[CacheKey]) -> Result<(), CourseCacheError> {
        let mut entries = self.entries()?;
        for key in keys {
            entries.remove(key.as_str());
        }
        Ok(())
    }
}
