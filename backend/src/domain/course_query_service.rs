//! Cache-aside course read models.
//!
//! Reads try the cache first and fall back to committed catalogue state. The
//! cache is advisory: backend or decoding failures are logged and treated as
//! misses. Written entries carry up to ten percent TTL jitter so keys filled
//! together do not expire together.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use crate::domain::ports::{
    CacheKey, CourseAvailability, CourseCache, CourseCatalogueError, CourseCatalogueRepository,
    CourseDetails, CourseListing, CourseQuery, CourseSearch, CourseSearchPage,
};
use crate::domain::{Course, CourseId, Error};

/// Time-to-live per read model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub availability: Duration,
    pub details: Duration,
    pub search: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            availability: Duration::from_secs(60),
            details: Duration::from_secs(300),
            search: Duration::from_secs(60),
        }
    }
}

fn jittered(ttl: Duration) -> Duration {
    let ceiling = u64::try_from(ttl.as_millis() / 10).unwrap_or(u64::MAX);
    let extra = rand::thread_rng().gen_range(0..=ceiling);
    ttl.saturating_add(Duration::from_millis(extra))
}

fn catalogue_failure(cause: CourseCatalogueError) -> Error {
    match cause {
        CourseCatalogueError::Connection { message } => {
            error!(%message, "course catalogue unreachable");
            Error::service_unavailable("the course catalogue is unavailable; try again later")
        }
        CourseCatalogueError::Query { message } => {
            error!(%message, "course catalogue query failed");
            Error::internal("an unexpected error occurred")
        }
    }
}

fn course_not_found(id: CourseId) -> Error {
    Error::not_found(format!("course {id} does not exist"))
}

/// [`CourseQuery`] implementation over a catalogue repository and cache.
#[derive(Clone)]
pub struct CourseQueryService {
    catalogue: Arc<dyn CourseCatalogueRepository>,
    cache: Arc<dyn CourseCache>,
    ttls: CacheTtls,
}

impl CourseQueryService {
    pub fn new(
        catalogue: Arc<dyn CourseCatalogueRepository>,
        cache: Arc<dyn CourseCache>,
        ttls: CacheTtls,
    ) -> Self {
        Self {
            catalogue,
            cache,
            ttls,
        }
    }

    async fn cached<T, F, Fut>(&self, key: CacheKey, ttl: Duration, load: F) -> Result<T, Error>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        match self.cache.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    debug!(%key, "course cache hit");
                    return Ok(value);
                }
                Err(cause) => warn!(%key, error = %cause, "discarding undecodable cache entry"),
            },
            Ok(None) => debug!(%key, "course cache miss"),
            Err(cause) => warn!(%key, error = %cause, "course cache read failed"),
        }

        let value = load().await?;
        match serde_json::to_string(&value) {
            Ok(raw) => {
                if let Err(cause) = self.cache.set(&key, &raw, jittered(ttl)).await {
                    warn!(%key, error = %cause, "course cache write failed");
                }
            }
            Err(cause) => warn!(%key, error = %cause, "course read model is not serialisable"),
        }
        Ok(value)
    }

    async fn load_course(&self, id: CourseId) -> Result<Course, Error> {
        self.catalogue
            .find_course(id)
            .await
            .map_err(catalogue_failure)?
            .ok_or_else(|| course_not_found(id))
    }
}

#[async_trait]
impl CourseQuery for CourseQueryService {
    async fn availability(&self, course_id: CourseId) -> Result<CourseAvailability, Error> {
        self.cached(
            CacheKey::course_availability(course_id),
            self.ttls.availability,
            || async move {
                let course = self.load_course(course_id).await?;
                Ok(CourseAvailability::from(&course))
            },
        )
        .await
    }

    async fn details(&self, course_id: CourseId) -> Result<CourseDetails, Error> {
        self.cached(
            CacheKey::course_details(course_id),
            self.ttls.details,
            || async move {
                let course = self.load_course(course_id).await?;
                let outline = self
                    .catalogue
                    .course_outline(course_id)
                    .await
                    .map_err(catalogue_failure)?;
                Ok(CourseDetails::new(&course, &outline))
            },
        )
        .await
    }

    async fn search(&self, search: CourseSearch) -> Result<CourseSearchPage, Error> {
        let key = CacheKey::course_search(&search.canonical());
        let search = &search;
        self.cached(key, self.ttls.search, || async move {
            let page = self
                .catalogue
                .search(search)
                .await
                .map_err(catalogue_failure)?;
            Ok(CourseSearchPage {
                courses: page.courses.iter().map(CourseListing::from).collect(),
                page: search.page,
                per_page: search.per_page,
                total: page.total,
            })
        })
        .await
    }
}
