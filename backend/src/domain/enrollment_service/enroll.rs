//! Enrollment creation.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info, instrument};

use crate::domain::ports::{
    CacheKey, CancellationReceipt, ChargeReceipt, ChargeRequest, CourseSeats, EnrollRequest,
    EnrollmentCommand, EnrollmentReceipt, EnrollmentTransaction, LessonCompletion, PaymentDetails,
    PaymentSummary,
};
use crate::domain::{
    CommittedEffects, Course, CourseId, CourseSummary, Enrollment, EnrollmentCreated,
    EnrollmentEvent, EnrollmentId, EnrollmentJob, EnrollmentOptions, Error, LessonId,
    LessonProgress, Money, Payment, Student, StudentSummary, UnitOfWork, payable_price,
};

use super::mapping::{self, AttemptError};
use super::{EnrollmentService, StudentPolicy};

/// Request validated against committed state, reused by every attempt.
struct PreparedEnrollment {
    student: Student,
    course_id: CourseId,
    payment: PaymentDetails,
    options: EnrollmentOptions,
    metadata: Value,
    lessons: Vec<LessonId>,
}

impl EnrollmentService {
    /// Validate the request and check the course without taking locks, so
    /// obviously doomed requests never reach the gateway.
    async fn prepare(&self, request: EnrollRequest) -> Result<PreparedEnrollment, Error> {
        let EnrollRequest {
            student,
            course_id,
            payment,
            options,
            unlock_plan,
            metadata,
        } = request;

        let student =
            Student::register(student, self.clock.utc()).map_err(mapping::student_error)?;
        let metadata = match metadata {
            Value::Null => Value::Object(serde_json::Map::new()),
            value @ Value::Object(_) => value,
            _ => {
                return Err(Error::invalid_request("metadata must be a JSON object")
                    .with_details(serde_json::json!({ "field": "metadata" })));
            }
        };

        let course = self
            .store
            .find_course(course_id)
            .await
            .map_err(mapping::store_error)?
            .ok_or_else(|| Error::not_found(format!("course {course_id} does not exist")))?;
        course.check_enrollable().map_err(mapping::seat_error)?;
        self.check_price(&course, &payment)?;

        let lessons = if unlock_plan.is_empty() {
            Vec::new()
        } else {
            let outline = self
                .store
                .course_outline(course_id)
                .await
                .map_err(mapping::store_error)?;
            unlock_plan.resolve(&outline).map_err(mapping::unlock_error)?
        };

        Ok(PreparedEnrollment {
            student,
            course_id,
            payment,
            options,
            metadata,
            lessons,
        })
    }

    /// Payable price for the submitted coupon, which must equal the
    /// submitted amount to the cent in the course currency.
    fn check_price(&self, course: &Course, payment: &PaymentDetails) -> Result<Money, Error> {
        let payable = payable_price(
            self.discount.as_ref(),
            course,
            payment.coupon_code.as_deref(),
        )
        .map_err(mapping::discount_error)?;
        if payment.currency != *course.currency() || payment.amount != payable {
            return Err(mapping::price_mismatch(
                payable,
                payment.amount,
                course.currency().as_str(),
            ));
        }
        Ok(payable)
    }

    async fn enroll_once(
        &self,
        prepared: &PreparedEnrollment,
    ) -> Result<(EnrollmentReceipt, CommittedEffects), AttemptError> {
        let policy = self.config.student_policy;
        let mut uow = UnitOfWork::begin(self.store.as_ref())
            .await
            .map_err(|cause| mapping::classify(cause, policy))?;
        let mut charge = None;
        let outcome = self.enroll_in(&mut uow, prepared, &mut charge).await;
        let finished = Self::finish(uow, outcome, policy).await;
        if let (Err(_), Some(receipt)) = (&finished, charge) {
            self.refund_abandoned_charge(&receipt).await;
        }
        finished
    }

    async fn enroll_in(
        &self,
        uow: &mut UnitOfWork,
        prepared: &PreparedEnrollment,
        charge: &mut Option<ChargeReceipt>,
    ) -> Result<EnrollmentReceipt, AttemptError> {
        let policy = self.config.student_policy;
        let classify = |cause| mapping::classify(cause, policy);
        let now = self.clock.utc();
        let tx = uow.tx();

        let student = self.resolve_student(tx, prepared).await?;

        let mut course = tx
            .lock_course(prepared.course_id)
            .await
            .map_err(classify)?
            .ok_or_else(|| {
                Error::not_found(format!("course {} does not exist", prepared.course_id))
            })?;
        course.check_enrollable().map_err(mapping::seat_error)?;
        let payable = self.check_price(&course, &prepared.payment)?;
        if tx
            .has_enrollment(student.id(), course.id())
            .await
            .map_err(classify)?
        {
            return Err(Error::duplicate_enrollment(
                "the student is already enrolled in this course",
            )
            .into());
        }

        let enrollment = Enrollment::open(
            student.id(),
            course.id(),
            prepared.options,
            prepared.metadata.clone(),
            now,
        );
        let mut payment = Payment::pending(
            enrollment.id(),
            payable,
            prepared.payment.currency.clone(),
            prepared.payment.method,
            prepared.payment.coupon_code.clone(),
            now,
        );
        tx.insert_payment(&payment).await.map_err(classify)?;

        let receipt = self
            .gateway
            .charge(&ChargeRequest {
                payment_id: payment.id,
                amount: payment.amount,
                currency: payment.currency.clone(),
                method: payment.method,
            })
            .await
            .map_err(mapping::gateway_error)?;
        *charge = Some(receipt.clone());
        payment
            .complete(receipt.transaction_id, now)
            .map_err(mapping::payment_state_error)?;
        tx.update_payment(&payment).await.map_err(classify)?;

        tx.insert_enrollment(&enrollment).await.map_err(classify)?;
        if !prepared.lessons.is_empty() {
            let rows: Vec<LessonProgress> = prepared
                .lessons
                .iter()
                .map(|lesson| LessonProgress::unlocked(enrollment.id(), *lesson))
                .collect();
            tx.insert_lesson_progress(&rows).await.map_err(classify)?;
        }

        course.reserve_seat().map_err(mapping::seat_error)?;
        tx.update_course_seats(&course).await.map_err(classify)?;

        let outbox = uow.outbox();
        outbox.invalidate(CacheKey::for_course(course.id()));
        outbox.dispatch(EnrollmentJob::SetupCourseAccess {
            enrollment_id: enrollment.id(),
        });
        if enrollment.send_welcome_email() {
            outbox.dispatch(EnrollmentJob::SendWelcomeNotification {
                enrollment_id: enrollment.id(),
            });
        }
        outbox.publish(EnrollmentEvent::Created(EnrollmentCreated {
            enrollment_id: enrollment.id(),
            student: StudentSummary::from(&student),
            course: CourseSummary::from(&course),
            notify_instructor: enrollment.notify_instructor(),
            occurred_at: now,
        }));

        Ok(receipt_for(
            &enrollment,
            &student,
            &course,
            &payment,
            prepared.lessons.clone(),
        ))
    }

    async fn resolve_student(
        &self,
        tx: &mut dyn EnrollmentTransaction,
        prepared: &PreparedEnrollment,
    ) -> Result<Student, AttemptError> {
        let policy = self.config.student_policy;
        let existing = tx
            .find_student_by_email(prepared.student.email())
            .await
            .map_err(|cause| mapping::classify(cause, policy))?;
        match (existing, policy) {
            (Some(student), StudentPolicy::ReuseExisting) => Ok(student),
            (Some(student), StudentPolicy::AlwaysCreate) => {
                let enrolled = tx
                    .has_enrollment(student.id(), prepared.course_id)
                    .await
                    .map_err(|cause| mapping::classify(cause, policy))?;
                Err(if enrolled {
                    Error::duplicate_enrollment("the student is already enrolled in this course")
                } else {
                    Error::duplicate_student("a student with this email already exists")
                }
                .into())
            }
            (None, _) => {
                tx.insert_student(&prepared.student)
                    .await
                    .map_err(|cause| mapping::classify(cause, policy))?;
                Ok(prepared.student.clone())
            }
        }
    }

    async fn refund_abandoned_charge(&self, receipt: &ChargeReceipt) {
        match self.gateway.refund(receipt).await {
            Ok(()) => info!(
                transaction_id = %receipt.transaction_id,
                "refunded charge of rolled back enrollment"
            ),
            Err(cause) => error!(
                transaction_id = %receipt.transaction_id,
                amount = %receipt.amount,
                error = %cause,
                "refund of rolled back enrollment failed; manual reconciliation required"
            ),
        }
    }
}

pub(super) fn seats(course: &Course) -> CourseSeats {
    CourseSeats {
        id: course.id(),
        title: course.title().to_owned(),
        available_slots: course.available_slots(),
        enrolled_count: course.enrolled_count(),
    }
}

fn receipt_for(
    enrollment: &Enrollment,
    student: &Student,
    course: &Course,
    payment: &Payment,
    unlocked_lessons: Vec<LessonId>,
) -> EnrollmentReceipt {
    EnrollmentReceipt {
        enrollment_id: enrollment.id(),
        status: enrollment.status(),
        enrolled_at: enrollment.enrolled_at(),
        started_at: enrollment.started_at(),
        expires_at: enrollment.expires_at(),
        student: StudentSummary::from(student),
        course: seats(course),
        payment: PaymentSummary {
            id: payment.id,
            amount: payment.amount,
            currency: payment.currency.clone(),
            method: payment.method,
            status: payment.status,
            transaction_id: payment.transaction_id.clone(),
        },
        unlocked_lessons,
    }
}

#[async_trait]
impl EnrollmentCommand for EnrollmentService {
    #[instrument(skip_all, fields(course_id = %request.course_id))]
    async fn enroll(&self, request: EnrollRequest) -> Result<EnrollmentReceipt, Error> {
        let prepared = self.prepare(request).await?;
        let receipt = self
            .with_retry("enroll", || self.enroll_once(&prepared))
            .await?;
        info!(
            enrollment_id = %receipt.enrollment_id,
            student_id = %receipt.student.id,
            available_slots = receipt.course.available_slots,
            "enrollment committed"
        );
        Ok(receipt)
    }

    #[instrument(skip(self))]
    async fn cancel(&self, enrollment_id: EnrollmentId) -> Result<CancellationReceipt, Error> {
        self.cancel_enrollment(enrollment_id).await
    }

    #[instrument(skip(self))]
    async fn complete_lesson(
        &self,
        enrollment_id: EnrollmentId,
        lesson_id: LessonId,
    ) -> Result<LessonCompletion, Error> {
        self.complete_enrollment_lesson(enrollment_id, lesson_id)
            .await
    }
}
