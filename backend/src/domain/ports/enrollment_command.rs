//! Driving port for enrollment mutations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::domain::{
    CourseId, Currency, EnrollmentId, EnrollmentOptions, EnrollmentStatus, Error, LessonId, Money,
    PaymentId, PaymentMethod, PaymentStatus, StudentDraft, StudentSummary, UnlockPlan,
};

/// Payment fields submitted with an enrollment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentDetails {
    pub amount: Money,
    pub currency: Currency,
    pub method: PaymentMethod,
    pub coupon_code: Option<String>,
}

/// Enrollment request after transport-level parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollRequest {
    pub student: StudentDraft,
    pub course_id: CourseId,
    pub payment: PaymentDetails,
    pub options: EnrollmentOptions,
    pub unlock_plan: UnlockPlan,
    pub metadata: Value,
}

/// Course seat counters after the enrollment committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseSeats {
    pub id: CourseId,
    pub title: String,
    pub available_slots: u32,
    pub enrolled_count: u32,
}

/// Payment as recorded by the enrollment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSummary {
    pub id: PaymentId,
    pub amount: Money,
    pub currency: Currency,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
}

/// Result of a committed enrollment.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentReceipt {
    pub enrollment_id: EnrollmentId,
    pub status: EnrollmentStatus,
    pub enrolled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub student: StudentSummary,
    pub course: CourseSeats,
    pub payment: PaymentSummary,
    pub unlocked_lessons: Vec<LessonId>,
}

/// Result of a committed cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationReceipt {
    pub enrollment_id: EnrollmentId,
    pub status: EnrollmentStatus,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub refunded: bool,
    pub course: CourseSeats,
}

/// Progress after a lesson completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonCompletion {
    pub enrollment_id: EnrollmentId,
    pub lesson_id: LessonId,
    pub completed_lessons: usize,
    pub total_lessons: usize,
    pub status: EnrollmentStatus,
}

/// Enrollment mutations exposed to inbound adapters.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EnrollmentCommand: Send + Sync {
    /// Enroll a student, reserving a seat and taking payment atomically.
    async fn enroll(&self, request: EnrollRequest) -> Result<EnrollmentReceipt, Error>;

    /// Cancel a pending or active enrollment and release its seat.
    async fn cancel(&self, enrollment_id: EnrollmentId) -> Result<CancellationReceipt, Error>;

    /// Mark one unlocked lesson complete.
    async fn complete_lesson(
        &self,
        enrollment_id: EnrollmentId,
        lesson_id: LessonId,
    ) -> Result<LessonCompletion, Error>;
}
