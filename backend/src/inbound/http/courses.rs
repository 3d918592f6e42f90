//! Course read handlers, served from the cached read models.
//!
//! ```text
//! GET /api/v1/courses?search=&page=&per_page=
//! GET /api/v1/courses/{course_id}
//! GET /api/v1/courses/{course_id}/availability
//! ```

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, get, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::ports::{CourseAvailability, CourseDetails, CourseSearch, CourseSearchPage};
use crate::domain::{ApiResult, CourseId, CourseStatus, Error};
use crate::inbound::http::envelope::{ErrorEnvelope, SuccessEnvelope};
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::parse_path_id;

const DEFAULT_PER_PAGE: u32 = 20;

/// Query string accepted by the course search.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CourseSearchParams {
    /// Case-insensitive title fragment.
    pub search: Option<String>,
    /// One-based page number; defaults to 1.
    pub page: Option<u32>,
    /// Page size; defaults to 20, capped at 100.
    pub per_page: Option<u32>,
}

impl From<CourseSearchParams> for CourseSearch {
    fn from(params: CourseSearchParams) -> Self {
        CourseSearch::new(
            params.search.unwrap_or_default(),
            CourseStatus::Published,
            params.page.unwrap_or(1),
            params.per_page.unwrap_or(DEFAULT_PER_PAGE),
        )
    }
}

fn parse_course_id(raw: &str) -> Result<CourseId, Error> {
    parse_path_id(raw, "course_id").map(CourseId::new)
}

/// Search published courses by title.
#[utoipa::path(
    get,
    path = "/api/v1/courses",
    params(CourseSearchParams),
    responses(
        (status = 200, description = "Page of published courses", body = SuccessEnvelope<CourseSearchPage>),
        (status = 400, description = "Invalid query", body = ErrorEnvelope),
        (status = 503, description = "Catalogue unavailable", body = ErrorEnvelope)
    ),
    tags = ["courses"],
    operation_id = "searchCourses"
)]
#[get("/courses")]
pub async fn search_courses(
    state: web::Data<HttpState>,
    query: web::Query<CourseSearchParams>,
) -> ApiResult<HttpResponse> {
    let page = state.courses.search(query.into_inner().into()).await?;
    Ok(SuccessEnvelope::new("Courses retrieved", page).respond(StatusCode::OK))
}

/// Course details with its module and lesson outline.
#[utoipa::path(
    get,
    path = "/api/v1/courses/{course_id}",
    params(("course_id" = i64, Path, description = "Course identifier")),
    responses(
        (status = 200, description = "Course details", body = SuccessEnvelope<CourseDetails>),
        (status = 400, description = "Invalid identifier", body = ErrorEnvelope),
        (status = 404, description = "Course not found", body = ErrorEnvelope)
    ),
    tags = ["courses"],
    operation_id = "getCourse"
)]
#[get("/courses/{course_id}")]
pub async fn course_details(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let course_id = parse_course_id(path.as_str())?;
    let details = state.courses.details(course_id).await?;
    Ok(SuccessEnvelope::new("Course retrieved", details).respond(StatusCode::OK))
}

/// Seat counters for a course.
#[utoipa::path(
    get,
    path = "/api/v1/courses/{course_id}/availability",
    params(("course_id" = i64, Path, description = "Course identifier")),
    responses(
        (status = 200, description = "Seat availability", body = SuccessEnvelope<CourseAvailability>),
        (status = 400, description = "Invalid identifier", body = ErrorEnvelope),
        (status = 404, description = "Course not found", body = ErrorEnvelope)
    ),
    tags = ["courses"],
    operation_id = "getCourseAvailability"
)]
#[get("/courses/{course_id}/availability")]
pub async fn course_availability(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let course_id = parse_course_id(path.as_str())?;
    let availability = state.courses.availability(course_id).await?;
    Ok(SuccessEnvelope::new("Availability retrieved", availability).respond(StatusCode::OK))
}
