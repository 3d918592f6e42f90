//! Cancellation, lesson progress and access expiry.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::domain::ports::{
    CacheKey, CancellationReceipt, ChargeReceipt, EnrollmentStoreError, LessonCompletion,
};
use crate::domain::{
    CommittedEffects, EnrollmentCancelled, EnrollmentCompleted, EnrollmentEvent, EnrollmentId,
    EnrollmentStatus, Error, LessonId, Money, PaymentStatus, UnitOfWork,
};

use super::EnrollmentService;
use super::enroll::seats;
use super::mapping::{self, AttemptError};

fn enrollment_not_found(id: EnrollmentId) -> Error {
    Error::not_found(format!("enrollment {id} does not exist"))
}

impl EnrollmentService {
    /// Cancel a pending or active enrollment, release its seat and refund a
    /// completed payment.
    pub(super) async fn cancel_enrollment(
        &self,
        id: EnrollmentId,
    ) -> Result<CancellationReceipt, Error> {
        // Transaction ids already refunded by an earlier attempt.
        let refunded = Mutex::new(None::<String>);
        let receipt = self
            .with_retry("cancel", || self.cancel_once(id, &refunded))
            .await?;
        info!(enrollment_id = %id, refunded = receipt.refunded, "enrollment cancelled");
        Ok(receipt)
    }

    async fn cancel_once(
        &self,
        id: EnrollmentId,
        refunded: &Mutex<Option<String>>,
    ) -> Result<(CancellationReceipt, CommittedEffects), AttemptError> {
        let policy = self.config.student_policy;
        let mut uow = UnitOfWork::begin(self.store.as_ref())
            .await
            .map_err(|cause| mapping::classify(cause, policy))?;
        let outcome = self.cancel_in(&mut uow, id, refunded).await;
        Self::finish(uow, outcome, policy).await
    }

    async fn cancel_in(
        &self,
        uow: &mut UnitOfWork,
        id: EnrollmentId,
        refunded: &Mutex<Option<String>>,
    ) -> Result<CancellationReceipt, AttemptError> {
        let policy = self.config.student_policy;
        let classify = |cause| mapping::classify(cause, policy);
        let now = self.clock.utc();
        let tx = uow.tx();

        // Course before enrollment, matching the lock order of enroll.
        let course_id = tx
            .find_enrollment(id)
            .await
            .map_err(classify)?
            .ok_or_else(|| enrollment_not_found(id))?
            .course_id();
        let mut course = tx
            .lock_course(course_id)
            .await
            .map_err(classify)?
            .ok_or_else(|| {
                error!(enrollment_id = %id, %course_id, "enrollment references a missing course");
                Error::internal("an unexpected error occurred")
            })?;
        let mut enrollment = tx
            .lock_enrollment(id)
            .await
            .map_err(classify)?
            .ok_or_else(|| enrollment_not_found(id))?;
        enrollment.cancel(now).map_err(mapping::transition_error)?;

        let mut was_refunded = false;
        if let Some(mut payment) = tx.find_payment(id).await.map_err(classify)? {
            if payment.status == PaymentStatus::Completed {
                if let Some(transaction_id) = payment.transaction_id.clone() {
                    self.refund_once(refunded, transaction_id, payment.amount)
                        .await?;
                }
                payment.refund().map_err(mapping::payment_state_error)?;
                tx.update_payment(&payment).await.map_err(classify)?;
                was_refunded = true;
            }
        }

        course.release_seat();
        tx.update_enrollment(&enrollment).await.map_err(classify)?;
        tx.update_course_seats(&course).await.map_err(classify)?;

        let outbox = uow.outbox();
        outbox.invalidate(CacheKey::for_course(course.id()));
        outbox.publish(EnrollmentEvent::Cancelled(EnrollmentCancelled {
            enrollment_id: id,
            student_id: enrollment.student_id(),
            course_id: course.id(),
            refunded: was_refunded,
            occurred_at: now,
        }));

        Ok(CancellationReceipt {
            enrollment_id: id,
            status: enrollment.status(),
            cancelled_at: enrollment.cancelled_at(),
            refunded: was_refunded,
            course: seats(&course),
        })
    }

    /// Refund through the gateway unless an earlier attempt already did.
    async fn refund_once(
        &self,
        refunded: &Mutex<Option<String>>,
        transaction_id: String,
        amount: Money,
    ) -> Result<(), AttemptError> {
        let already = refunded
            .lock()
            .map_err(|_| Error::internal("an unexpected error occurred"))?
            .as_deref()
            == Some(transaction_id.as_str());
        if already {
            return Ok(());
        }
        let receipt = ChargeReceipt {
            transaction_id,
            amount,
        };
        self.gateway
            .refund(&receipt)
            .await
            .map_err(mapping::gateway_error)?;
        *refunded
            .lock()
            .map_err(|_| Error::internal("an unexpected error occurred"))? =
            Some(receipt.transaction_id);
        Ok(())
    }

    /// Mark one unlocked lesson complete; the last one completes the
    /// enrollment.
    pub(super) async fn complete_enrollment_lesson(
        &self,
        id: EnrollmentId,
        lesson_id: LessonId,
    ) -> Result<LessonCompletion, Error> {
        let completion = self
            .with_retry("complete_lesson", || self.complete_lesson_once(id, lesson_id))
            .await?;
        info!(
            enrollment_id = %id,
            %lesson_id,
            completed = completion.completed_lessons,
            total = completion.total_lessons,
            "lesson completed"
        );
        Ok(completion)
    }

    async fn complete_lesson_once(
        &self,
        id: EnrollmentId,
        lesson_id: LessonId,
    ) -> Result<(LessonCompletion, CommittedEffects), AttemptError> {
        let policy = self.config.student_policy;
        let mut uow = UnitOfWork::begin(self.store.as_ref())
            .await
            .map_err(|cause| mapping::classify(cause, policy))?;
        let outcome = self.complete_lesson_in(&mut uow, id, lesson_id).await;
        Self::finish(uow, outcome, policy).await
    }

    async fn complete_lesson_in(
        &self,
        uow: &mut UnitOfWork,
        id: EnrollmentId,
        lesson_id: LessonId,
    ) -> Result<LessonCompletion, AttemptError> {
        let policy = self.config.student_policy;
        let classify = |cause| mapping::classify(cause, policy);
        let now = self.clock.utc();
        let tx = uow.tx();

        let mut enrollment = tx
            .lock_enrollment(id)
            .await
            .map_err(classify)?
            .ok_or_else(|| enrollment_not_found(id))?;
        if enrollment.status() != EnrollmentStatus::Active {
            return Err(Error::invalid_state_transition(format!(
                "lessons can only be completed on active enrollments; this one is {}",
                enrollment.status()
            ))
            .into());
        }

        let mut rows = tx.lesson_progress(id).await.map_err(classify)?;
        let row = rows
            .iter_mut()
            .find(|row| row.lesson_id == lesson_id)
            .ok_or_else(|| {
                Error::not_found(format!(
                    "lesson {lesson_id} is not unlocked for enrollment {id}"
                ))
            })?;
        if !row.is_completed {
            row.mark_complete(now);
            tx.update_lesson_progress(row).await.map_err(classify)?;
        }

        let total_lessons = rows.len();
        let completed_lessons = rows.iter().filter(|row| row.is_completed).count();
        if completed_lessons == total_lessons {
            enrollment.complete(now).map_err(mapping::transition_error)?;
            tx.update_enrollment(&enrollment).await.map_err(classify)?;
            uow.outbox()
                .publish(EnrollmentEvent::Completed(EnrollmentCompleted {
                    enrollment_id: id,
                    course_id: enrollment.course_id(),
                    last_lesson_id: lesson_id,
                    occurred_at: now,
                }));
        }

        Ok(LessonCompletion {
            enrollment_id: id,
            lesson_id,
            completed_lessons,
            total_lessons,
            status: enrollment.status(),
        })
    }

    /// Expire active enrollments whose access window has passed. Returns
    /// how many were expired; failures on individual rows are logged and
    /// skipped.
    pub async fn expire_overdue(&self) -> Result<usize, Error> {
        let now = self.clock.utc();
        let candidates = self
            .store
            .overdue_enrollments(now)
            .await
            .map_err(mapping::store_error)?;
        let mut expired = 0;
        for id in candidates {
            match self
                .with_retry("expire", || self.expire_once(id, now))
                .await
            {
                Ok(true) => expired += 1,
                Ok(false) => {}
                Err(cause) => warn!(enrollment_id = %id, error = %cause, "could not expire enrollment"),
            }
        }
        if expired > 0 {
            info!(expired, "expired overdue enrollments");
        }
        Ok(expired)
    }

    async fn expire_once(
        &self,
        id: EnrollmentId,
        now: DateTime<Utc>,
    ) -> Result<(bool, CommittedEffects), AttemptError> {
        let policy = self.config.student_policy;
        let mut uow = UnitOfWork::begin(self.store.as_ref())
            .await
            .map_err(|cause| mapping::classify(cause, policy))?;
        let outcome = Self::expire_in(&mut uow, id, now).await;
        Self::finish(uow, outcome, policy).await
    }

    async fn expire_in(
        uow: &mut UnitOfWork,
        id: EnrollmentId,
        now: DateTime<Utc>,
    ) -> Result<bool, AttemptError> {
        let tx = uow.tx();
        let Some(mut enrollment) = tx.lock_enrollment(id).await.map_err(retryable)? else {
            return Ok(false);
        };
        // Re-checked under the lock; a concurrent cancel may have won.
        if !enrollment.is_overdue(now) {
            return Ok(false);
        }
        enrollment.expire().map_err(mapping::transition_error)?;
        tx.update_enrollment(&enrollment).await.map_err(retryable)?;
        Ok(true)
    }
}

fn retryable(cause: EnrollmentStoreError) -> AttemptError {
    mapping::classify(cause, super::StudentPolicy::AlwaysCreate)
}
