//! Cache keys for course read models.
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::domain::CourseId;

/// Key into the course cache.
///
/// Keys for course-derived values are built through the named constructors
/// so the enrollment flow and the read side agree on spelling.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Construct a cache key after validating that it is non-empty and trimmed.
    pub fn new(value: impl Into<String>) -> Result<Self, CacheKeyValidationError> {
        let raw = value.into();
        if raw.trim().is_empty() {
            return Err(CacheKeyValidationError::Empty);
        }
        if raw.trim() != raw {
            return Err(CacheKeyValidationError::ContainsWhitespace);
        }
        Ok(Self(raw))
    }

    /// `course:{id}:availability`
    pub fn course_availability(course_id: CourseId) -> Self {
        Self(format!("course:{course_id}:availability"))
    }

    /// `course:{id}:details`
    pub fn course_details(course_id: CourseId) -> Self {
        Self(format!("course:{course_id}:details"))
    }

    /// Both keys derived from a course's capacity or content.
    pub fn for_course(course_id: CourseId) -> Vec<Self> {
        vec![
            Self::course_availability(course_id),
            Self::course_details(course_id),
        ]
    }

    /// `courses:search:{sha256(canonical query)}`
    ///
    /// # Examples
    /// ```
    /// use learning_platform::domain::ports::CacheKey;
    ///
    /// let key = CacheKey::course_search("q=rust&page=1&per_page=20");
    /// assert!(key.as_str().starts_with("courses:search:"));
    /// assert_eq!(key.as_str().len(), "courses:search:".len() + 64);
    /// ```
    pub fn course_search(canonical_query: &str) -> Self {
        let digest = Sha256::digest(canonical_query.as_bytes());
        Self(format!("courses:search:{}", hex::encode(digest)))
    }

    /// Borrow the underlying key as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Validation errors returned when constructing [`CacheKey`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheKeyValidationError {
    /// Key is empty after trimming whitespace.
    #[error("cache key must not be empty")]
    Empty,
    /// Key contains leading or trailing whitespace.
    #[error("cache key must not contain surrounding whitespace")]
    ContainsWhitespace,
}
