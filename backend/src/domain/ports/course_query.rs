//! Driving port for cached course read models.
//!
//! Read models are serialised into the course cache, so every type here is a
//! flat serde view rather than a domain aggregate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Course, CourseId, CourseOutline, CourseStatus, Error};

use super::CourseSearch;

/// Seat counters for one course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CourseAvailability {
    pub course_id: i64,
    pub available_slots: u32,
    pub max_students: u32,
    pub enrolled_count: u32,
    pub is_open: bool,
}

impl From<&Course> for CourseAvailability {
    fn from(course: &Course) -> Self {
        Self {
            course_id: course.id().get(),
            available_slots: course.available_slots(),
            max_students: course.max_students(),
            enrolled_count: course.enrolled_count(),
            is_open: course.is_open(),
        }
    }
}

/// Course listing entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CourseListing {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub discount_price: Option<f64>,
    pub effective_price: f64,
    pub currency: String,
    pub status: CourseStatus,
}

impl From<&Course> for CourseListing {
    fn from(course: &Course) -> Self {
        Self {
            id: course.id().get(),
            title: course.title().to_owned(),
            description: course.description().map(str::to_owned),
            price: course.price().as_decimal(),
            discount_price: course.discount_price().map(|p| p.as_decimal()),
            effective_price: course.effective_price().as_decimal(),
            currency: course.currency().to_string(),
            status: course.status(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LessonView {
    pub id: i64,
    pub title: String,
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ModuleView {
    pub id: i64,
    pub title: String,
    pub position: i32,
    pub lessons: Vec<LessonView>,
}

/// Course with capacity and its module/lesson tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CourseDetails {
    #[serde(flatten)]
    pub listing: CourseListing,
    pub instructor_email: Option<String>,
    pub availability: CourseAvailability,
    pub modules: Vec<ModuleView>,
}

impl CourseDetails {
    pub fn new(course: &Course, outline: &CourseOutline) -> Self {
        let modules = outline
            .modules()
            .iter()
            .map(|module| ModuleView {
                id: module.id.get(),
                title: module.title.clone(),
                position: module.position,
                lessons: module
                    .lessons
                    .iter()
                    .map(|lesson| LessonView {
                        id: lesson.id.get(),
                        title: lesson.title.clone(),
                        position: lesson.position,
                    })
                    .collect(),
            })
            .collect();
        Self {
            listing: CourseListing::from(course),
            instructor_email: course.instructor_email().map(str::to_owned),
            availability: CourseAvailability::from(course),
            modules,
        }
    }
}

/// Page of search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CourseSearchPage {
    pub courses: Vec<CourseListing>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

/// Course reads exposed to inbound adapters.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CourseQuery: Send + Sync {
    async fn availability(&self, course_id: CourseId) -> Result<CourseAvailability, Error>;

    async fn details(&self, course_id: CourseId) -> Result<CourseDetails, Error>;

    async fn search(&self, search: CourseSearch) -> Result<CourseSearchPage, Error>;
}
