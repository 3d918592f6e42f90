//! Port for committed-state course catalogue reads.

use async_trait::async_trait;

use crate::domain::{Course, CourseId, CourseOutline, CourseStatus};

use super::define_port_error;

define_port_error! {
    /// Errors raised by catalogue repository adapters.
    pub enum CourseCatalogueError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "course catalogue connection failed: {message}",
        /// Query failed during execution.
        Query { message: String } =>
            "course catalogue query failed: {message}",
    }
}

/// Maximum page size accepted by [`CourseSearch`].
pub const MAX_PER_PAGE: u32 = 100;

/// Paginated title search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseSearch {
    /// Case-insensitive title fragment; empty matches every course.
    pub query: String,
    pub status: CourseStatus,
    /// One-based page number.
    pub page: u32,
    pub per_page: u32,
}

impl CourseSearch {
    /// Normalise paging bounds and trim the query.
    pub fn new(query: impl Into<String>, status: CourseStatus, page: u32, per_page: u32) -> Self {
        Self {
            query: query.into().trim().to_owned(),
            status,
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    /// Rows to skip before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }

    /// Stable textual form used to derive the cache key.
    pub fn canonical(&self) -> String {
        format!(
            "q={}&status={}&page={}&per_page={}",
            self.query.to_lowercase(),
            self.status,
            self.page,
            self.per_page
        )
    }
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq)]
pub struct CoursePage {
    pub courses: Vec<Course>,
    pub total: u64,
}

/// Read-only access to courses and their outlines.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CourseCatalogueRepository: Send + Sync {
    async fn find_course(&self, id: CourseId) -> Result<Option<Course>, CourseCatalogueError>;

    async fn course_outline(&self, id: CourseId) -> Result<CourseOutline, CourseCatalogueError>;

    /// Courses matching the search, ordered by id.
    async fn search(&self, search: &CourseSearch) -> Result<CoursePage, CourseCatalogueError>;
}
