//! Domain primitives, aggregates and services.
//!
//! Purpose: define strongly typed entities for students, courses,
//! enrollments and payments, plus the services that orchestrate them through
//! the ports in [`ports`]. Nothing here performs I/O directly.
//!
//! Public surface:
//! - [`Error`] / [`ErrorCode`]: transport-agnostic failure payload.
//! - [`EnrollmentService`]: seat reservation, cancellation and progress.
//! - [`CourseQueryService`]: cache-aside course read models.
//! - [`EnrollmentJobService`]: handlers for post-commit jobs.

pub mod course;
mod course_query_service;
mod discount;
mod enrollment;
mod enrollment_job_service;
mod enrollment_service;
pub mod error;
mod events;
mod jobs;
mod money;
mod payment;
pub mod ports;
pub(crate) mod retry;
mod student;
mod trace_id;
mod unit_of_work;

pub use self::course::{
    Course, CourseDraft, CourseId, CourseModule, CourseOutline, CourseStatus,
    CourseValidationError, Lesson, LessonId, ModuleId, SeatError, UnknownStatus,
};
pub use self::course_query_service::{CacheTtls, CourseQueryService};
pub use self::discount::{
    DiscountError, DiscountPolicy, NoCouponDiscount, PercentageCouponTable, payable_price,
};
pub use self::enrollment::{
    ACCESS_PERIOD_MONTHS, Enrollment, EnrollmentId, EnrollmentOptions, EnrollmentParts,
    EnrollmentStatus, LessonProgress, ModuleUnlock, TransitionError, UnlockPlan, UnlockPlanError,
};
pub use self::enrollment_job_service::EnrollmentJobService;
pub use self::enrollment_service::{
    EnrollmentService, EnrollmentServiceConfig, EnrollmentServicePorts, StudentPolicy,
    UnknownStudentPolicy,
};
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::events::{
    CourseSummary, EnrollmentCancelled, EnrollmentCompleted, EnrollmentCreated, EnrollmentEvent,
    StudentSummary,
};
pub use self::jobs::EnrollmentJob;
pub use self::money::{Currency, Money, MoneyValidationError};
pub use self::payment::{
    Payment, PaymentId, PaymentMethod, PaymentStatus, PaymentTransitionError,
};
pub use self::retry::{
    AttemptJitter, BackoffJitter, RetryPolicy, RetryRuntime, RetrySleeper, TokioSleeper,
};
pub use self::student::{
    EMAIL_MAX, EmailAddress, NAME_MAX, Student, StudentDraft, StudentId, StudentValidationError,
};
pub use self::trace_id::{TRACE_ID_HEADER, TraceId};
pub use self::unit_of_work::{
    CommittedEffects, EffectDispatcher, Outbox, PostCommitEffect, UnitOfWork,
};

/// Convenient API result alias.
///
/// # Examples
/// ```
/// use learning_platform::domain::{ApiResult, Error};
///
/// fn handler() -> ApiResult<()> {
///     Err(Error::not_found("course 9 does not exist"))
/// }
/// assert!(handler().is_err());
/// ```
pub type ApiResult<T> = Result<T, Error>;
