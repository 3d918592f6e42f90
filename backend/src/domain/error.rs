//! Domain-level error types.
//!
//! These errors are transport agnostic. Inbound adapters map them to HTTP
//! responses or any other protocol-specific envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::domain::TraceId;

/// Stable machine-readable error code describing the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The request is malformed or fails validation.
    InvalidRequest,
    /// The requested resource does not exist.
    NotFound,
    /// The course has no seats left.
    CourseFull,
    /// The course is not open for enrollment.
    CourseNotPublished,
    /// The student already holds an enrollment for the course.
    DuplicateEnrollment,
    /// A student with the same email is already registered.
    DuplicateStudent,
    /// The submitted amount differs from the course's payable price.
    PriceMismatch,
    /// The payment gateway declined or failed the charge.
    PaymentFailed,
    /// The enrollment cannot move to the requested status.
    InvalidStateTransition,
    /// Transient store failures persisted across every attempt.
    TransactionRetryExhausted,
    /// A dependency is unavailable.
    ServiceUnavailable,
    /// An unexpected error occurred inside the domain.
    InternalError,
}

impl ErrorCode {
    /// Snake-case identifier used in response envelopes.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::NotFound => "not_found",
            Self::CourseFull => "course_full",
            Self::CourseNotPublished => "course_not_published",
            Self::DuplicateEnrollment => "duplicate_enrollment",
            Self::DuplicateStudent => "duplicate_student",
            Self::PriceMismatch => "price_mismatch",
            Self::PaymentFailed => "payment_failed",
            Self::InvalidStateTransition => "invalid_state_transition",
            Self::TransactionRetryExhausted => "transaction_retry_exhausted",
            Self::ServiceUnavailable => "service_unavailable",
            Self::InternalError => "internal_error",
        }
    }
}

/// Validation errors emitted by the fallible constructors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorValidationError {
    /// The message is blank.
    #[error("error message must not be empty")]
    EmptyMessage,
    /// The trace identifier is blank.
    #[error("trace identifier must not be empty")]
    EmptyTraceId,
}

/// Domain error payload.
///
/// ## Invariants
/// - `message` must be non-empty once trimmed of whitespace.
/// - `trace_id`, when present, is captured from the task-local request scope.
///
/// # Examples
/// ```
/// use learning_platform::domain::{Error, ErrorCode};
///
/// let err = Error::course_full("no seats left");
/// assert_eq!(err.code(), ErrorCode::CourseFull);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    code: ErrorCode,
    message: String,
    details: Option<Value>,
    trace_id: Option<String>,
}

impl Error {
    /// Create a new error, panicking if validation fails.
    ///
    /// Callers pass string literals or formatted messages, so an empty
    /// message is a programming error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        match Self::try_new(code, message) {
            Ok(value) => value,
            Err(err) => panic!("error messages must satisfy validation: {err}"),
        }
    }

    /// Fallible constructor that validates the message content.
    pub fn try_new(code: ErrorCode, message: impl Into<String>) -> Result<Self, ErrorValidationError> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(ErrorValidationError::EmptyMessage);
        }
        Ok(Self {
            code,
            message,
            details: None,
            trace_id: TraceId::current().map(|id| id.to_string()),
        })
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable message returned to adapters.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Supplementary error details for adapters.
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Correlation identifier captured when the error was built.
    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// Attach structured details to the error.
    ///
    /// # Examples
    /// ```
    /// use learning_platform::domain::Error;
    /// use serde_json::json;
    ///
    /// let err = Error::invalid_request("bad").with_details(json!({ "field": "email" }));
    /// assert!(err.details().is_some());
    /// ```
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Attach a trace identifier, replacing any captured one.
    pub fn with_trace_id(mut self, id: impl Into<String>) -> Self {
        self.trace_id = Some(id.into());
        self
    }

    /// Fallible variant of [`Error::with_trace_id`].
    pub fn try_with_trace_id(self, id: impl Into<String>) -> Result<Self, ErrorValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ErrorValidationError::EmptyTraceId);
        }
        Ok(self.with_trace_id(id))
    }

    /// Convenience constructor for [`ErrorCode::InvalidRequest`].
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Convenience constructor for [`ErrorCode::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Convenience constructor for [`ErrorCode::CourseFull`].
    pub fn course_full(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CourseFull, message)
    }

    /// Convenience constructor for [`ErrorCode::CourseNotPublished`].
    pub fn course_not_published(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CourseNotPublished, message)
    }

    /// Convenience constructor for [`ErrorCode::DuplicateEnrollment`].
    pub fn duplicate_enrollment(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DuplicateEnrollment, message)
    }

    /// Convenience constructor for [`ErrorCode::DuplicateStudent`].
    pub fn duplicate_student(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DuplicateStudent, message)
    }

    /// Convenience constructor for [`ErrorCode::PriceMismatch`].
    pub fn price_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PriceMismatch, message)
    }

    /// Convenience constructor for [`ErrorCode::PaymentFailed`].
    pub fn payment_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PaymentFailed, message)
    }

    /// Convenience constructor for [`ErrorCode::InvalidStateTransition`].
    pub fn invalid_state_transition(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidStateTransition, message)
    }

    /// Convenience constructor for [`ErrorCode::TransactionRetryExhausted`].
    pub fn retry_exhausted(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TransactionRetryExhausted, message)
    }

    /// Convenience constructor for [`ErrorCode::ServiceUnavailable`].
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    /// Convenience constructor for [`ErrorCode::InternalError`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    //! Constructor, validation, and trace capture coverage.

    use rstest::rstest;
    use serde_json::json;

    use super::*;

    const TRACE_ID: &str = "00000000-0000-0000-0000-000000000000";

    #[rstest]
    #[case(Error::invalid_request("bad"), ErrorCode::InvalidRequest)]
    #[case(Error::course_full("full"), ErrorCode::CourseFull)]
    #[case(Error::price_mismatch("price"), ErrorCode::PriceMismatch)]
    #[case(Error::retry_exhausted("retry"), ErrorCode::TransactionRetryExhausted)]
    fn constructors_set_code(#[case] error: Error, #[case] expected: ErrorCode) {
        assert_eq!(error.code(), expected);
    }

    #[rstest]
    fn try_new_rejects_empty_messages() {
        let result = Error::try_new(ErrorCode::InvalidRequest, "   ");
        assert_eq!(result, Err(ErrorValidationError::EmptyMessage));
    }

    #[rstest]
    fn try_with_trace_id_rejects_blank_values() {
        let result = Error::internal("boom").try_with_trace_id(" ");
        assert_eq!(result, Err(ErrorValidationError::EmptyTraceId));
    }

    #[rstest]
    fn trace_id_is_absent_out_of_scope() {
        assert!(Error::internal("boom").trace_id().is_none());
    }

    #[tokio::test]
    async fn new_captures_trace_id_in_scope() {
        let trace_id: TraceId = TRACE_ID.parse().expect("valid UUID");
        let error = TraceId::scope(trace_id, async move { Error::internal("boom") }).await;
        assert_eq!(error.trace_id(), Some(TRACE_ID));
    }

    #[rstest]
    fn details_are_attached() {
        let err = Error::invalid_request("bad").with_details(json!({"field": "email"}));
        assert_eq!(err.details(), Some(&json!({"field": "email"})));
    }

    #[rstest]
    fn codes_render_snake_case() {
        let rendered = serde_json::to_value(ErrorCode::DuplicateEnrollment).expect("serialise");
        assert_eq!(rendered, json!("duplicate_enrollment"));
        assert_eq!(ErrorCode::DuplicateEnrollment.as_str(), "duplicate_enrollment");
    }
}
