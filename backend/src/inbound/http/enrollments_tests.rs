//! Tests for enrollment HTTP handlers.

use std::sync::Arc;

use actix_web::body::to_bytes;
use actix_web::http::StatusCode;
use actix_web::{App, test as actix_test, web};
use chrono::{TimeZone, Utc};
use mockall::predicate::eq;
use rstest::{fixture, rstest};
use serde_json::{Value, json};

use super::*;
use crate::domain::ports::{MockCourseQuery, MockEnrollmentCommand};
use crate::domain::{PaymentId, StudentId};
use crate::inbound::http::error::json_error_handler;
use crate::inbound::http::state::HttpStatePorts;

const ENROLLMENT_ID: &str = "00000000-0000-0000-0000-0000000000e1";

fn enrollment_id() -> EnrollmentId {
    parse_enrollment_id(ENROLLMENT_ID).expect("valid id")
}

fn seats() -> CourseSeats {
    CourseSeats {
        id: CourseId::new(7),
        title: "Laravel from Scratch".to_owned(),
        available_slots: 2,
        enrolled_count: 8,
    }
}

fn receipt() -> EnrollmentReceipt {
    let now = Utc
        .with_ymd_and_hms(2026, 3, 1, 10, 0, 0)
        .single()
        .expect("valid time");
    EnrollmentReceipt {
        enrollment_id: enrollment_id(),
        status: EnrollmentStatus::Active,
        enrolled_at: now,
        started_at: Some(now),
        expires_at: None,
        student: StudentSummary {
            id: StudentId::random(),
            email: "ada@example.com".to_owned(),
            full_name: "Ada Lovelace".to_owned(),
        },
        course: seats(),
        payment: PaymentSummary {
            id: PaymentId::random(),
            amount: Money::from_cents(15_000).expect("amount"),
            currency: Currency::usd(),
            method: PaymentMethod::CreditCard,
            status: PaymentStatus::Completed,
            transaction_id: Some("sim_1".to_owned()),
        },
        unlocked_lessons: vec![LessonId::new(1), LessonId::new(2)],
    }
}

#[fixture]
fn body() -> Value {
    json!({
        "student": {
            "email": "ada@example.com",
            "first_name": "Ada",
            "last_name": "Lovelace"
        },
        "course": {"id": 7},
        "payment": {"amount": 150.00, "currency": "USD", "method": "credit_card"},
        "enrollment": {
            "start_immediately": true,
            "modules": [{"module_id": 3, "lessons": [{"lesson_id": 1}, {"lesson_id": 2}]}]
        },
        "metadata": {"source": "web"}
    })
}

fn state(command: MockEnrollmentCommand) -> HttpState {
    HttpState::new(HttpStatePorts {
        enrollments: Arc::new(command),
        courses: Arc::new(MockCourseQuery::new()),
    })
}

async fn call(command: MockEnrollmentCommand, request: actix_test::TestRequest) -> (StatusCode, Value) {
    let app = actix_test::init_service(
        App::new()
            .app_data(web::Data::new(state(command)))
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .service(
                web::scope("/api/v1")
                    .service(create_enrollment)
                    .service(cancel_enrollment)
                    .service(complete_lesson),
            ),
    )
    .await;
    let response = actix_test::call_service(&app, request.to_request()).await;
    let status = response.status();
    let bytes = to_bytes(response.into_body()).await.expect("body");
    let value = serde_json::from_slice(&bytes).expect("json body");
    (status, value)
}

fn post(uri: &str) -> actix_test::TestRequest {
    actix_test::TestRequest::post().uri(uri)
}

#[rstest]
#[actix_web::test]
async fn create_returns_201_with_success_envelope(body: Value) {
    let mut command = MockEnrollmentCommand::new();
    command
        .expect_enroll()
        .times(1)
        .withf(|request: &EnrollRequest| {
            request.course_id == CourseId::new(7)
                && request.payment.amount.cents() == 15_000
                && request.options.start_immediately
                && request.options.send_welcome_email
                && request.unlock_plan.modules().len() == 1
                && request.metadata == json!({"source": "web"})
        })
        .returning(|_| Ok(receipt()));

    let (status, value) = call(command, post("/api/v1/enrollments").set_json(&body)).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(value["success"], true);
    assert_eq!(value["message"], "Enrollment created successfully");
    assert_eq!(value["data"]["enrollment_id"], ENROLLMENT_ID);
    assert_eq!(value["data"]["status"], "active");
    assert_eq!(value["data"]["course"]["available_slots"], 2);
    assert_eq!(value["data"]["payment"]["amount"], 150.0);
    assert_eq!(value["data"]["payment"]["method"], "credit_card");
    assert_eq!(value["data"]["unlocked_lessons"], json!([1, 2]));
    assert!(value["meta"]["trace_id"].is_string());
}

#[rstest]
#[actix_web::test]
async fn create_defaults_an_omitted_enrollment_block(body: Value) {
    let mut body = body;
    body.as_object_mut().expect("object body").remove("enrollment");
    let mut command = MockEnrollmentCommand::new();
    command
        .expect_enroll()
        .times(1)
        .withf(|request: &EnrollRequest| {
            request.options == EnrollmentOptions::default() && request.unlock_plan.is_empty()
        })
        .returning(|_| Ok(receipt()));

    let (status, _) = call(command, post("/api/v1/enrollments").set_json(&body)).await;

    assert_eq!(status, StatusCode::CREATED);
}

#[rstest]
#[case::bad_course("/course/id", json!(0), "course.id", "invalid_id")]
#[case::negative_amount("/payment/amount", json!(-5), "payment.amount", "invalid_amount")]
#[case::currency("/payment/currency", json!("dollars"), "payment.currency", "invalid_currency")]
#[case::method("/payment/method", json!("cash"), "payment.method", "invalid_payment_method")]
#[case::metadata("/metadata", json!([1]), "metadata", "invalid_type")]
#[case::module(
    "/enrollment/modules/0/module_id",
    json!(-3),
    "enrollment.modules[0].module_id",
    "invalid_id"
)]
#[actix_web::test]
async fn create_rejects_malformed_fields(
    body: Value,
    #[case] pointer: &str,
    #[case] replacement: Value,
    #[case] field: &str,
    #[case] code: &str,
) {
    let mut body = body;
    *body.pointer_mut(pointer).expect("pointer exists") = replacement;
    let mut command = MockEnrollmentCommand::new();
    command.expect_enroll().times(0);

    let (status, value) = call(command, post("/api/v1/enrollments").set_json(&body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value["success"], false);
    assert_eq!(value["error_code"], "invalid_request");
    assert_eq!(value["errors"]["field"], field);
    assert_eq!(value["errors"]["code"], code);
}

#[rstest]
#[actix_web::test]
async fn create_reports_unparseable_bodies_as_invalid_requests() {
    let mut command = MockEnrollmentCommand::new();
    command.expect_enroll().times(0);

    let request = post("/api/v1/enrollments")
        .insert_header(("content-type", "application/json"))
        .set_payload("{\"student\":");
    let (status, value) = call(command, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value["error_code"], "invalid_request");
    assert_eq!(value["errors"]["code"], "malformed_body");
}

#[rstest]
#[case(Error::course_full("the course has no available seats"), StatusCode::CONFLICT, "course_full")]
#[case(Error::price_mismatch("100.00 vs 150.00"), StatusCode::UNPROCESSABLE_ENTITY, "price_mismatch")]
#[case(Error::payment_failed("declined"), StatusCode::PAYMENT_REQUIRED, "payment_failed")]
#[case(Error::retry_exhausted("busy"), StatusCode::SERVICE_UNAVAILABLE, "transaction_retry_exhausted")]
#[actix_web::test]
async fn create_maps_domain_failures(
    body: Value,
    #[case] error: Error,
    #[case] expected_status: StatusCode,
    #[case] expected_code: &str,
) {
    let mut command = MockEnrollmentCommand::new();
    command.expect_enroll().return_once(move |_| Err(error));

    let (status, value) = call(command, post("/api/v1/enrollments").set_json(&body)).await;

    assert_eq!(status, expected_status);
    assert_eq!(value["success"], false);
    assert_eq!(value["error_code"], expected_code);
}

#[rstest]
#[actix_web::test]
async fn cancel_returns_the_receipt() {
    let mut command = MockEnrollmentCommand::new();
    command
        .expect_cancel()
        .with(eq(enrollment_id()))
        .returning(|id| {
            Ok(CancellationReceipt {
                enrollment_id: id,
                status: EnrollmentStatus::Cancelled,
                cancelled_at: Some(Utc::now()),
                refunded: true,
                course: seats(),
            })
        });

    let (status, value) = call(
        command,
        post(&format!("/api/v1/enrollments/{ENROLLMENT_ID}/cancel")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["data"]["status"], "cancelled");
    assert_eq!(value["data"]["refunded"], true);
}

#[rstest]
#[actix_web::test]
async fn cancel_rejects_malformed_ids() {
    let mut command = MockEnrollmentCommand::new();
    command.expect_cancel().times(0);

    let (status, value) = call(command, post("/api/v1/enrollments/not-a-uuid/cancel")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value["errors"]["field"], "enrollment_id");
}

#[rstest]
#[actix_web::test]
async fn complete_lesson_reports_progress() {
    let mut command = MockEnrollmentCommand::new();
    command
        .expect_complete_lesson()
        .with(eq(enrollment_id()), eq(LessonId::new(2)))
        .returning(|id, lesson_id| {
            Ok(LessonCompletion {
                enrollment_id: id,
                lesson_id,
                completed_lessons: 2,
                total_lessons: 2,
                status: EnrollmentStatus::Completed,
            })
        });

    let (status, value) = call(
        command,
        post(&format!("/api/v1/enrollments/{ENROLLMENT_ID}/lessons/2/complete")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["data"]["lesson_id"], 2);
    assert_eq!(value["data"]["status"], "completed");
}

#[rstest]
#[actix_web::test]
async fn complete_lesson_on_inactive_enrollment_conflicts() {
    let mut command = MockEnrollmentCommand::new();
    command
        .expect_complete_lesson()
        .returning(|_, _| Err(Error::invalid_state_transition("enrollment is not active")));

    let (status, value) = call(
        command,
        post(&format!("/api/v1/enrollments/{ENROLLMENT_ID}/lessons/2/complete")),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(value["error_code"], "invalid_state_transition");
}
