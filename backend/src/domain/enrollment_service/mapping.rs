//! Translation of store, gateway and validation failures into domain errors.

use serde_json::json;
use tracing::error;

use crate::domain::ports::{EnrollmentStoreError, PaymentGatewayError, UniqueTarget};
use crate::domain::{
    DiscountError, Error, Money, PaymentTransitionError, SeatError, StudentValidationError,
    TransitionError, UnlockPlanError,
};

use super::StudentPolicy;

/// Outcome of a failed attempt.
#[derive(Debug)]
pub(super) enum AttemptError {
    /// A fresh attempt may succeed.
    Retryable(EnrollmentStoreError),
    /// Reported to the caller as is.
    Fatal(Error),
}

impl From<Error> for AttemptError {
    fn from(error: Error) -> Self {
        Self::Fatal(error)
    }
}

/// Classify a store failure raised inside a transaction.
pub(super) fn classify(cause: EnrollmentStoreError, policy: StudentPolicy) -> AttemptError {
    match cause {
        EnrollmentStoreError::Transient { .. } => AttemptError::Retryable(cause),
        // A concurrent registration of the same email committed first; the
        // next attempt reads it back.
        EnrollmentStoreError::Conflict {
            target: UniqueTarget::StudentEmail,
        } if policy == StudentPolicy::ReuseExisting => AttemptError::Retryable(cause),
        other => AttemptError::Fatal(store_error(other)),
    }
}

/// Map a store failure that will not be retried.
pub(super) fn store_error(cause: EnrollmentStoreError) -> Error {
    match cause {
        EnrollmentStoreError::Conflict {
            target: UniqueTarget::StudentEmail,
        } => Error::duplicate_student("a student with this email already exists"),
        EnrollmentStoreError::Conflict {
            target: UniqueTarget::StudentCourse,
        } => Error::duplicate_enrollment("the student is already enrolled in this course"),
        EnrollmentStoreError::Connection { message } => {
            error!(%message, "enrollment store unreachable");
            Error::service_unavailable("the enrollment store is unavailable; try again later")
        }
        other => {
            error!(error = %other, "enrollment store failure");
            Error::internal("an unexpected error occurred")
        }
    }
}

pub(super) fn seat_error(cause: SeatError) -> Error {
    match cause {
        SeatError::NotPublished => {
            Error::course_not_published("the course is not open for enrollment")
        }
        SeatError::Full => Error::course_full("the course has no available seats"),
    }
}

pub(super) fn student_error(cause: StudentValidationError) -> Error {
    let (field, code) = match &cause {
        StudentValidationError::EmptyEmail => ("student.email".to_owned(), "required"),
        StudentValidationError::InvalidEmail => ("student.email".to_owned(), "invalid_email"),
        StudentValidationError::EmptyName { field } => (format!("student.{field}"), "required"),
        StudentValidationError::NameTooLong { field, .. } => {
            (format!("student.{field}"), "too_long")
        }
        StudentValidationError::InvalidPhone => ("student.phone".to_owned(), "invalid_phone"),
        StudentValidationError::InvalidPreferences => {
            ("student.preferences".to_owned(), "invalid_type")
        }
    };
    Error::invalid_request(cause.to_string()).with_details(json!({ "field": field, "code": code }))
}

pub(super) fn unlock_error(cause: UnlockPlanError) -> Error {
    let details = match &cause {
        UnlockPlanError::UnknownModule { index, module_id } => json!({
            "field": format!("enrollment.modules[{index}].module_id"),
            "code": "unknown_module",
            "value": module_id.get(),
            "index": index,
        }),
        UnlockPlanError::UnknownLesson {
            module_index,
            lesson_index,
            lesson_id,
            ..
        } => json!({
            "field": format!("enrollment.modules[{module_index}].lessons[{lesson_index}]"),
            "code": "unknown_lesson",
            "value": lesson_id.get(),
            "index": lesson_index,
        }),
    };
    Error::invalid_request(cause.to_string()).with_details(details)
}

pub(super) fn discount_error(cause: DiscountError) -> Error {
    match cause {
        DiscountError::UnknownCoupon { ref code } => Error::invalid_request(cause.to_string())
            .with_details(json!({
                "field": "payment.coupon_code",
                "code": "unknown_coupon",
                "value": code,
            })),
        DiscountError::InvalidEntry { .. } => {
            error!(error = %cause, "discount policy misconfigured");
            Error::internal("an unexpected error occurred")
        }
    }
}

pub(super) fn price_mismatch(expected: Money, submitted: Money, currency: &str) -> Error {
    Error::price_mismatch(format!(
        "payment amount {submitted} {currency} does not match the payable price {expected} {currency}"
    ))
    .with_details(json!({
        "expected": expected.as_decimal(),
        "submitted": submitted.as_decimal(),
        "currency": currency,
    }))
}

pub(super) fn gateway_error(cause: PaymentGatewayError) -> Error {
    match cause {
        PaymentGatewayError::Declined { reason } => {
            Error::payment_failed(format!("payment was declined: {reason}"))
        }
        PaymentGatewayError::Unavailable { message } => {
            error!(%message, "payment gateway unavailable");
            Error::payment_failed("the payment could not be processed; no charge was made")
        }
    }
}

pub(super) fn transition_error(cause: TransitionError) -> Error {
    Error::invalid_state_transition(cause.to_string())
        .with_details(json!({ "from": cause.from.as_str(), "to": cause.to.as_str() }))
}

pub(super) fn payment_state_error(cause: PaymentTransitionError) -> Error {
    error!(error = %cause, "payment state machine rejected a transition");
    Error::internal("an unexpected error occurred")
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::domain::ErrorCode;

    fn fatal_code(error: AttemptError) -> Option<ErrorCode> {
        match error {
            AttemptError::Fatal(error) => Some(error.code()),
            AttemptError::Retryable(_) => None,
        }
    }

    #[rstest]
    #[case(StudentPolicy::AlwaysCreate, Some(ErrorCode::DuplicateStudent))]
    #[case(StudentPolicy::ReuseExisting, None)]
    fn email_conflicts_depend_on_policy(
        #[case] policy: StudentPolicy,
        #[case] expected: Option<ErrorCode>,
    ) {
        let cause = EnrollmentStoreError::conflict(UniqueTarget::StudentEmail);
        assert_eq!(fatal_code(classify(cause, policy)), expected);
    }

    #[rstest]
    #[case(EnrollmentStoreError::transient("deadlock detected"), None)]
    #[case(
        EnrollmentStoreError::conflict(UniqueTarget::StudentCourse),
        Some(ErrorCode::DuplicateEnrollment)
    )]
    #[case(
        EnrollmentStoreError::connection("refused"),
        Some(ErrorCode::ServiceUnavailable)
    )]
    #[case(EnrollmentStoreError::query("syntax"), Some(ErrorCode::InternalError))]
    fn store_failures_are_classified(
        #[case] cause: EnrollmentStoreError,
        #[case] expected: Option<ErrorCode>,
    ) {
        assert_eq!(fatal_code(classify(cause, StudentPolicy::AlwaysCreate)), expected);
    }

    #[rstest]
    fn internal_errors_hide_the_cause() {
        let error = store_error(EnrollmentStoreError::query("relation \"courses\" missing"));
        assert!(!error.message().contains("courses"));
    }

    #[rstest]
    fn unlock_errors_point_at_the_offending_field() {
        let error = unlock_error(UnlockPlanError::UnknownLesson {
            module_index: 1,
            lesson_index: 0,
            module_id: crate::domain::ModuleId::new(2),
            lesson_id: crate::domain::LessonId::new(99),
        });
        assert_eq!(error.code(), ErrorCode::InvalidRequest);
        assert_eq!(
            error.details().and_then(|d| d.get("field")),
            Some(&json!("enrollment.modules[1].lessons[0]"))
        );
    }
}
