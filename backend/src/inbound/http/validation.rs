//! Shared validation helpers for inbound HTTP adapters.
//!
//! Field-level failures carry `{field, code, value?, index?}` details so
//! clients can point at the offending input.

use serde_json::{Value, json};
use uuid::Uuid;

use crate::domain::Error;

/// Validation error codes for HTTP request failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorCode {
    InvalidUuid,
    InvalidId,
    InvalidAmount,
    InvalidCurrency,
    InvalidPaymentMethod,
    InvalidType,
    OutOfRange,
    MalformedBody,
}

impl ErrorCode {
    fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidUuid => "invalid_uuid",
            ErrorCode::InvalidId => "invalid_id",
            ErrorCode::InvalidAmount => "invalid_amount",
            ErrorCode::InvalidCurrency => "invalid_currency",
            ErrorCode::InvalidPaymentMethod => "invalid_payment_method",
            ErrorCode::InvalidType => "invalid_type",
            ErrorCode::OutOfRange => "out_of_range",
            ErrorCode::MalformedBody => "malformed_body",
        }
    }
}

/// Builder for validation errors with field context.
pub(crate) struct ValidationError {
    field: String,
    message: String,
}

impl ValidationError {
    pub(crate) fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    pub(crate) fn with_code(self, code: ErrorCode) -> Error {
        Error::invalid_request(self.message).with_details(json!({
            "field": self.field,
            "code": code.as_str(),
        }))
    }

    pub(crate) fn with_value(self, code: ErrorCode, value: impl Into<Value>) -> Error {
        Error::invalid_request(self.message).with_details(json!({
            "field": self.field,
            "value": value.into(),
            "code": code.as_str(),
        }))
    }

    pub(crate) fn with_index(self, code: ErrorCode, index: usize, value: impl Into<Value>) -> Error {
        Error::invalid_request(self.message).with_details(json!({
            "field": self.field,
            "index": index,
            "value": value.into(),
            "code": code.as_str(),
        }))
    }
}

pub(crate) fn parse_uuid(value: &str, field: &str) -> Result<Uuid, Error> {
    Uuid::parse_str(value).map_err(|_| {
        ValidationError::new(field, format!("{field} must be a valid UUID"))
            .with_value(ErrorCode::InvalidUuid, value)
    })
}

/// Parse a positive integer identifier.
pub(crate) fn parse_id(value: i64, field: &str) -> Result<i64, Error> {
    if value > 0 {
        Ok(value)
    } else {
        Err(
            ValidationError::new(field, format!("{field} must be a positive integer"))
                .with_value(ErrorCode::InvalidId, value),
        )
    }
}

/// Parse a positive integer identifier at `index` within a list.
pub(crate) fn parse_indexed_id(value: i64, field: &str, index: usize) -> Result<i64, Error> {
    if value > 0 {
        Ok(value)
    } else {
        Err(
            ValidationError::new(field, format!("{field} must contain positive integers"))
                .with_index(ErrorCode::InvalidId, index, value),
        )
    }
}

/// Parse a path segment holding a positive integer identifier.
pub(crate) fn parse_path_id(value: &str, field: &str) -> Result<i64, Error> {
    let invalid = || {
        ValidationError::new(field, format!("{field} must be a positive integer"))
            .with_value(ErrorCode::InvalidId, value)
    };
    let parsed = value.parse::<i64>().map_err(|_| invalid())?;
    if parsed > 0 { Ok(parsed) } else { Err(invalid()) }
}

/// Reject body values that are present but not JSON objects.
pub(crate) fn require_object(value: Option<Value>, field: &str) -> Result<Value, Error> {
    match value {
        None | Some(Value::Null) => Ok(json!({})),
        Some(value @ Value::Object(_)) => Ok(value),
        Some(other) => Err(
            ValidationError::new(field, format!("{field} must be a JSON object"))
                .with_value(ErrorCode::InvalidType, other),
        ),
    }
}

/// Error for a body or query string that could not be deserialised.
pub(crate) fn malformed_body_error(field: &str, cause: impl std::fmt::Display) -> Error {
    ValidationError::new(field, format!("request {field} is malformed: {cause}"))
        .with_code(ErrorCode::MalformedBody)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::domain::ErrorCode as DomainCode;

    fn detail<'a>(error: &'a Error, key: &str) -> &'a Value {
        error
            .details()
            .and_then(|details| details.get(key))
            .expect("detail present")
    }

    #[rstest]
    fn uuid_failures_name_the_field() {
        let error = parse_uuid("nope", "enrollment_id").expect_err("invalid");
        assert_eq!(error.code(), DomainCode::InvalidRequest);
        assert_eq!(detail(&error, "field"), "enrollment_id");
        assert_eq!(detail(&error, "code"), "invalid_uuid");
        assert_eq!(detail(&error, "value"), "nope");
    }

    #[rstest]
    #[case("12", Some(12))]
    #[case("0", None)]
    #[case("-4", None)]
    #[case("abc", None)]
    fn path_ids_must_be_positive_integers(#[case] raw: &str, #[case] expected: Option<i64>) {
        assert_eq!(parse_path_id(raw, "course_id").ok(), expected);
    }

    #[rstest]
    fn indexed_ids_report_their_position() {
        let error = parse_indexed_id(-1, "enrollment.modules[0].lessons", 2).expect_err("negative");
        assert_eq!(detail(&error, "index"), 2);
        assert_eq!(detail(&error, "value"), -1);
    }

    #[rstest]
    #[case(None, true)]
    #[case(Some(Value::Null), true)]
    #[case(Some(json!({"source": "web"})), true)]
    #[case(Some(json!([1, 2])), false)]
    #[case(Some(json!("text")), false)]
    fn objects_are_required_when_present(#[case] value: Option<Value>, #[case] accepted: bool) {
        assert_eq!(require_object(value, "metadata").is_ok(), accepted);
    }
}
