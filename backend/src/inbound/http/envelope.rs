//! JSON response envelopes shared by every endpoint.
//!
//! ```text
//! {"success": true,  "message": ..., "data": ..., "meta": {"trace_id", "timestamp"}}
//! {"success": false, "message": ..., "errors": ..., "error_code": ..., "trace_id": ...}
//! ```

use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::domain::{Error, ErrorCode, TraceId};

/// Correlation metadata attached to successful responses.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ResponseMeta {
    #[schema(format = "uuid")]
    pub trace_id: String,
    pub timestamp: DateTime<Utc>,
}

impl ResponseMeta {
    fn now() -> Self {
        Self {
            trace_id: TraceId::current_or_generate().to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Successful response wrapper.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SuccessEnvelope<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
    pub meta: ResponseMeta,
}

impl<T: Serialize> SuccessEnvelope<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            meta: ResponseMeta::now(),
        }
    }

    /// Render with the given status code.
    pub fn respond(self, status: StatusCode) -> HttpResponse {
        HttpResponse::build(status).json(self)
    }
}

/// Failure response wrapper.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorEnvelope {
    pub success: bool,
    #[schema(example = "the course has no available seats")]
    pub message: String,
    /// Field-level or contextual details, when available.
    pub errors: Option<Value>,
    #[schema(example = "course_full")]
    pub error_code: ErrorCode,
    pub trace_id: Option<String>,
}

impl From<&Error> for ErrorEnvelope {
    fn from(error: &Error) -> Self {
        Self {
            success: false,
            message: error.message().to_owned(),
            errors: error.details().cloned(),
            error_code: error.code(),
            trace_id: error.trace_id().map(str::to_owned),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn success_envelope_carries_scoped_trace_id() {
        let trace_id: TraceId = "00000000-0000-0000-0000-000000000001"
            .parse()
            .expect("valid uuid");
        let envelope = TraceId::scope(trace_id, async {
            SuccessEnvelope::new("done", json!({"id": 1}))
        })
        .await;

        let value = serde_json::to_value(&envelope).expect("serialise");
        assert_eq!(value["success"], true);
        assert_eq!(value["message"], "done");
        assert_eq!(value["data"]["id"], 1);
        assert_eq!(value["meta"]["trace_id"], trace_id.to_string());
        assert!(value["meta"]["timestamp"].is_string());
    }

    #[rstest]
    fn error_envelope_mirrors_the_error() {
        let error = Error::course_full("no seats")
            .with_trace_id("trace-1")
            .with_details(json!({"course_id": 3}));

        let value = serde_json::to_value(ErrorEnvelope::from(&error)).expect("serialise");

        assert_eq!(
            value,
            json!({
                "success": false,
                "message": "no seats",
                "errors": {"course_id": 3},
                "error_code": "course_full",
                "trace_id": "trace-1",
            })
        );
    }
}
