//! OpenAPI documentation configuration.
//!
//! [`ApiDoc`] registers every HTTP endpoint from the inbound layer together
//! with the envelope schemas. The generated OpenAPI document is served by
//! Swagger UI in debug builds.

use utoipa::OpenApi;

use crate::domain::ErrorCode;
use crate::inbound::http::envelope::{ErrorEnvelope, ResponseMeta};
use crate::inbound::http::enrollments::EnrollmentRequestBody;

/// OpenAPI document for the REST API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Learning platform enrollment API",
        description = "Enrollment transactions, course read models and health checks."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    paths(
        crate::inbound::http::enrollments::create_enrollment,
        crate::inbound::http::enrollments::cancel_enrollment,
        crate::inbound::http::enrollments::complete_lesson,
        crate::inbound::http::courses::search_courses,
        crate::inbound::http::courses::course_details,
        crate::inbound::http::courses::course_availability,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(ErrorEnvelope, ErrorCode, ResponseMeta, EnrollmentRequestBody)),
    tags(
        (name = "enrollments", description = "Enrollment transactions and lifecycle"),
        (name = "courses", description = "Cached course read models"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;
