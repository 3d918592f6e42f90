//! Enrollment HTTP handlers.
//!
//! ```text
//! POST /api/v1/enrollments
//! POST /api/v1/enrollments/{enrollment_id}/cancel
//! POST /api/v1/enrollments/{enrollment_id}/lessons/{lesson_id}/complete
//! ```

use std::str::FromStr;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, post, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::domain::ports::{
    CancellationReceipt, CourseSeats, EnrollRequest, EnrollmentReceipt, LessonCompletion,
    PaymentDetails, PaymentSummary,
};
use crate::domain::{
    ApiResult, CourseId, Currency, EnrollmentId, EnrollmentOptions, EnrollmentStatus, Error,
    LessonId, ModuleId, ModuleUnlock, Money, PaymentMethod, PaymentStatus, StudentDraft,
    StudentSummary, UnlockPlan,
};
use crate::inbound::http::envelope::{ErrorEnvelope, SuccessEnvelope};
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{
    ErrorCode, ValidationError, parse_id, parse_indexed_id, parse_path_id, parse_uuid,
    require_object,
};

/// Student fields submitted with an enrollment.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct StudentBody {
    #[schema(format = "email", example = "ada@example.com")]
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    /// Free-form preferences object.
    pub preferences: Option<Value>,
}

/// Course being enrolled into.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CourseRefBody {
    #[schema(example = 7)]
    pub id: i64,
}

/// Payment fields submitted with an enrollment.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct PaymentBody {
    /// Amount in major units, e.g. `150.00`.
    #[schema(example = 150.0)]
    pub amount: f64,
    #[schema(example = "USD")]
    pub currency: String,
    #[schema(example = "credit_card")]
    pub method: String,
    pub coupon_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct UnlockLessonBody {
    pub lesson_id: i64,
}

/// Module whose named lessons are unlocked on enrollment.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct UnlockModuleBody {
    pub module_id: i64,
    #[serde(default)]
    pub lessons: Vec<UnlockLessonBody>,
}

/// Enrollment configuration; omitted flags take their defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct EnrollmentConfigBody {
    /// Defaults to `false`.
    pub start_immediately: Option<bool>,
    /// Defaults to `true`.
    pub send_welcome_email: Option<bool>,
    /// Defaults to `true`.
    pub notify_instructor: Option<bool>,
    /// Lessons unlocked when the enrollment is created.
    #[serde(default)]
    pub modules: Vec<UnlockModuleBody>,
}

/// Request payload for creating an enrollment.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct EnrollmentRequestBody {
    pub student: StudentBody,
    pub course: CourseRefBody,
    pub payment: PaymentBody,
    #[serde(default)]
    pub enrollment: EnrollmentConfigBody,
    /// Arbitrary JSON object stored with the enrollment.
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StudentSummaryBody {
    #[schema(format = "uuid")]
    pub id: String,
    pub email: String,
    pub full_name: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CourseSeatsBody {
    pub id: i64,
    pub title: String,
    pub available_slots: u32,
    pub enrolled_count: u32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentSummaryBody {
    #[schema(format = "uuid")]
    pub id: String,
    pub amount: f64,
    pub currency: String,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
}

/// Response payload for a committed enrollment.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EnrollmentResponseBody {
    #[schema(format = "uuid")]
    pub enrollment_id: String,
    pub status: EnrollmentStatus,
    pub enrolled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub student: StudentSummaryBody,
    pub course: CourseSeatsBody,
    pub payment: PaymentSummaryBody,
    pub unlocked_lessons: Vec<i64>,
}

/// Response payload for a committed cancellation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CancellationResponseBody {
    #[schema(format = "uuid")]
    pub enrollment_id: String,
    pub status: EnrollmentStatus,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub refunded: bool,
    pub course: CourseSeatsBody,
}

/// Response payload for a completed lesson.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LessonCompletionResponseBody {
    #[schema(format = "uuid")]
    pub enrollment_id: String,
    pub lesson_id: i64,
    pub completed_lessons: usize,
    pub total_lessons: usize,
    pub status: EnrollmentStatus,
}

impl From<StudentSummary> for StudentSummaryBody {
    fn from(value: StudentSummary) -> Self {
        Self {
            id: value.id.to_string(),
            email: value.email,
            full_name: value.full_name,
        }
    }
}

impl From<CourseSeats> for CourseSeatsBody {
    fn from(value: CourseSeats) -> Self {
        Self {
            id: value.id.get(),
            title: value.title,
            available_slots: value.available_slots,
            enrolled_count: value.enrolled_count,
        }
    }
}

impl From<PaymentSummary> for PaymentSummaryBody {
    fn from(value: PaymentSummary) -> Self {
        Self {
            id: value.id.to_string(),
            amount: value.amount.as_decimal(),
            currency: value.currency.to_string(),
            method: value.method,
            status: value.status,
            transaction_id: value.transaction_id,
        }
    }
}

impl From<EnrollmentReceipt> for EnrollmentResponseBody {
    fn from(value: EnrollmentReceipt) -> Self {
        Self {
            enrollment_id: value.enrollment_id.to_string(),
            status: value.status,
            enrolled_at: value.enrolled_at,
            started_at: value.started_at,
            expires_at: value.expires_at,
            student: value.student.into(),
            course: value.course.into(),
            payment: value.payment.into(),
            unlocked_lessons: value.unlocked_lessons.into_iter().map(LessonId::get).collect(),
        }
    }
}

impl From<CancellationReceipt> for CancellationResponseBody {
    fn from(value: CancellationReceipt) -> Self {
        Self {
            enrollment_id: value.enrollment_id.to_string(),
            status: value.status,
            cancelled_at: value.cancelled_at,
            refunded: value.refunded,
            course: value.course.into(),
        }
    }
}

impl From<LessonCompletion> for LessonCompletionResponseBody {
    fn from(value: LessonCompletion) -> Self {
        Self {
            enrollment_id: value.enrollment_id.to_string(),
            lesson_id: value.lesson_id.get(),
            completed_lessons: value.completed_lessons,
            total_lessons: value.total_lessons,
            status: value.status,
        }
    }
}

fn parse_payment(payment: PaymentBody) -> Result<PaymentDetails, Error> {
    let amount = Money::from_decimal(payment.amount).map_err(|cause| {
        ValidationError::new("payment.amount", cause.to_string())
            .with_value(ErrorCode::InvalidAmount, payment.amount)
    })?;
    let currency = Currency::new(payment.currency.as_str()).map_err(|cause| {
        ValidationError::new("payment.currency", cause.to_string())
            .with_value(ErrorCode::InvalidCurrency, payment.currency.as_str())
    })?;
    let method = PaymentMethod::from_str(payment.method.as_str()).map_err(|_| {
        ValidationError::new(
            "payment.method",
            "payment.method must be credit_card, paypal or bank_transfer",
        )
        .with_value(ErrorCode::InvalidPaymentMethod, payment.method.as_str())
    })?;
    let coupon_code = payment
        .coupon_code
        .map(|code| code.trim().to_owned())
        .filter(|code| !code.is_empty());
    Ok(PaymentDetails {
        amount,
        currency,
        method,
        coupon_code,
    })
}

fn parse_unlock_plan(modules: Vec<UnlockModuleBody>) -> Result<UnlockPlan, Error> {
    let mut parsed = Vec::with_capacity(modules.len());
    for (index, module) in modules.into_iter().enumerate() {
        let module_id = parse_indexed_id(
            module.module_id,
            &format!("enrollment.modules[{index}].module_id"),
            index,
        )?;
        let field = format!("enrollment.modules[{index}].lessons");
        let lessons = module
            .lessons
            .into_iter()
            .enumerate()
            .map(|(lesson_index, lesson)| {
                parse_indexed_id(lesson.lesson_id, &field, lesson_index).map(LessonId::new)
            })
            .collect::<Result<Vec<_>, _>>()?;
        parsed.push(ModuleUnlock {
            module_id: ModuleId::new(module_id),
            lessons,
        });
    }
    Ok(UnlockPlan::new(parsed))
}

fn parse_options(config: &EnrollmentConfigBody) -> EnrollmentOptions {
    let defaults = EnrollmentOptions::default();
    EnrollmentOptions {
        start_immediately: config
            .start_immediately
            .unwrap_or(defaults.start_immediately),
        send_welcome_email: config
            .send_welcome_email
            .unwrap_or(defaults.send_welcome_email),
        notify_instructor: config
            .notify_instructor
            .unwrap_or(defaults.notify_instructor),
    }
}

/// Shape-level parsing; business validation happens in the domain.
pub(crate) fn parse_enroll_request(payload: EnrollmentRequestBody) -> Result<EnrollRequest, Error> {
    let EnrollmentRequestBody {
        student,
        course,
        payment,
        enrollment,
        metadata,
    } = payload;
    let options = parse_options(&enrollment);
    Ok(EnrollRequest {
        student: StudentDraft {
            email: student.email,
            first_name: student.first_name,
            last_name: student.last_name,
            phone: student.phone,
            preferences: student.preferences,
        },
        course_id: CourseId::new(parse_id(course.id, "course.id")?),
        payment: parse_payment(payment)?,
        options,
        unlock_plan: parse_unlock_plan(enrollment.modules)?,
        metadata: require_object(metadata, "metadata")?,
    })
}

fn parse_enrollment_id(raw: &str) -> Result<EnrollmentId, Error> {
    parse_uuid(raw, "enrollment_id").map(EnrollmentId::from_uuid)
}

/// Enroll a student, reserving a seat and taking payment.
#[utoipa::path(
    post,
    path = "/api/v1/enrollments",
    request_body = EnrollmentRequestBody,
    responses(
        (status = 201, description = "Enrollment committed", body = SuccessEnvelope<EnrollmentResponseBody>),
        (status = 400, description = "Invalid request", body = ErrorEnvelope),
        (status = 402, description = "Payment failed", body = ErrorEnvelope),
        (status = 404, description = "Course not found", body = ErrorEnvelope),
        (status = 409, description = "Course full or duplicate enrollment", body = ErrorEnvelope),
        (status = 422, description = "Course closed or price mismatch", body = ErrorEnvelope),
        (status = 503, description = "Retry budget exhausted or store unavailable", body = ErrorEnvelope)
    ),
    tags = ["enrollments"],
    operation_id = "createEnrollment"
)]
#[post("/enrollments")]
pub async fn create_enrollment(
    state: web::Data<HttpState>,
    payload: web::Json<EnrollmentRequestBody>,
) -> ApiResult<HttpResponse> {
    let request = parse_enroll_request(payload.into_inner())?;
    let receipt = state.enrollments.enroll(request).await?;
    Ok(SuccessEnvelope::new(
        "Enrollment created successfully",
        EnrollmentResponseBody::from(receipt),
    )
    .respond(StatusCode::CREATED))
}

/// Cancel a pending or active enrollment and release its seat.
#[utoipa::path(
    post,
    path = "/api/v1/enrollments/{enrollment_id}/cancel",
    params(("enrollment_id" = String, Path, format = "uuid", description = "Enrollment identifier")),
    responses(
        (status = 200, description = "Enrollment cancelled", body = SuccessEnvelope<CancellationResponseBody>),
        (status = 400, description = "Invalid identifier", body = ErrorEnvelope),
        (status = 404, description = "Enrollment not found", body = ErrorEnvelope),
        (status = 409, description = "Enrollment already terminal", body = ErrorEnvelope),
        (status = 503, description = "Service unavailable", body = ErrorEnvelope)
    ),
    tags = ["enrollments"],
    operation_id = "cancelEnrollment"
)]
#[post("/enrollments/{enrollment_id}/cancel")]
pub async fn cancel_enrollment(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let enrollment_id = parse_enrollment_id(path.as_str())?;
    let receipt = state.enrollments.cancel(enrollment_id).await?;
    Ok(SuccessEnvelope::new(
        "Enrollment cancelled",
        CancellationResponseBody::from(receipt),
    )
    .respond(StatusCode::OK))
}

/// Mark an unlocked lesson complete.
#[utoipa::path(
    post,
    path = "/api/v1/enrollments/{enrollment_id}/lessons/{lesson_id}/complete",
    params(
        ("enrollment_id" = String, Path, format = "uuid", description = "Enrollment identifier"),
        ("lesson_id" = i64, Path, description = "Lesson identifier")
    ),
    responses(
        (status = 200, description = "Lesson completed", body = SuccessEnvelope<LessonCompletionResponseBody>),
        (status = 400, description = "Invalid identifier", body = ErrorEnvelope),
        (status = 404, description = "Enrollment or lesson not found", body = ErrorEnvelope),
        (status = 409, description = "Enrollment is not active", body = ErrorEnvelope)
    ),
    tags = ["enrollments"],
    operation_id = "completeLesson"
)]
#[post("/enrollments/{enrollment_id}/lessons/{lesson_id}/complete")]
pub async fn complete_lesson(
    state: web::Data<HttpState>,
    path: web::Path<(String, String)>,
) -> ApiResult<HttpResponse> {
    let (enrollment_id, lesson_id) = path.into_inner();
    let enrollment_id = parse_enrollment_id(&enrollment_id)?;
    let lesson_id = LessonId::new(parse_path_id(&lesson_id, "lesson_id")?);
    let completion = state
        .enrollments
        .complete_lesson(enrollment_id, lesson_id)
        .await?;
    Ok(SuccessEnvelope::new(
        "Lesson completed",
        LessonCompletionResponseBody::from(completion),
    )
    .respond(StatusCode::OK))
}

#[cfg(test)]
#[path = "enrollments_tests.rs"]
mod tests;
