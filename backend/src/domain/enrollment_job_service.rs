//! Handlers for jobs dispatched after an enrollment commits.
//!
//! Jobs only ever observe committed enrollments: the outbox hands them to the
//! queue after commit. A missing enrollment is therefore reported as a job
//! failure rather than silently skipped.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use tracing::{debug, error, info};

use crate::domain::ports::{
    EnrollmentNotifier, EnrollmentStore, EnrollmentStoreError, JobHandler, WelcomeNotice,
};
use crate::domain::{
    CourseSummary, EnrollmentId, EnrollmentJob, EnrollmentStatus, Error, StudentSummary,
};

/// Executes [`EnrollmentJob`]s against the enrollment store.
#[derive(Clone)]
pub struct EnrollmentJobService {
    store: Arc<dyn EnrollmentStore>,
    notifier: Arc<dyn EnrollmentNotifier>,
    clock: Arc<dyn Clock>,
}

fn store_failure(cause: EnrollmentStoreError) -> Error {
    error!(error = %cause, "enrollment store failure while running job");
    Error::service_unavailable("the enrollment store is unavailable; try again later")
}

impl EnrollmentJobService {
    pub fn new(
        store: Arc<dyn EnrollmentStore>,
        notifier: Arc<dyn EnrollmentNotifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
        }
    }

    async fn send_welcome(&self, enrollment_id: EnrollmentId) -> Result<(), Error> {
        let detail = self
            .store
            .find_enrollment_detail(enrollment_id)
            .await
            .map_err(store_failure)?
            .ok_or_else(|| Error::not_found(format!("enrollment {enrollment_id} does not exist")))?;
        let notice = WelcomeNotice {
            enrollment_id,
            student: StudentSummary::from(&detail.student),
            course: CourseSummary::from(&detail.course),
        };
        self.notifier.send_welcome(&notice).await.map_err(|cause| {
            error!(%enrollment_id, error = %cause, "welcome notification failed");
            Error::service_unavailable("the notification channel is unavailable")
        })?;
        info!(%enrollment_id, "welcome notification sent");
        Ok(())
    }

    /// Activate a pending enrollment. Already active or terminal
    /// enrollments are left alone.
    async fn setup_access(&self, enrollment_id: EnrollmentId) -> Result<(), Error> {
        let mut tx = self.store.begin().await.map_err(store_failure)?;
        let enrollment = match tx.lock_enrollment(enrollment_id).await {
            Ok(Some(enrollment)) => enrollment,
            Ok(None) => {
                tx.rollback().await.map_err(store_failure)?;
                return Err(Error::not_found(format!(
                    "enrollment {enrollment_id} does not exist"
                )));
            }
            Err(cause) => {
                tx.rollback().await.map_err(store_failure)?;
                return Err(store_failure(cause));
            }
        };

        if enrollment.status() != EnrollmentStatus::Pending {
            debug!(%enrollment_id, status = %enrollment.status(), "course access already settled");
            return tx.rollback().await.map_err(store_failure);
        }

        let mut enrollment = enrollment;
        if let Err(cause) = enrollment.activate(self.clock.utc()) {
            tx.rollback().await.map_err(store_failure)?;
            return Err(Error::invalid_state_transition(cause.to_string()));
        }
        if let Err(cause) = tx.update_enrollment(&enrollment).await {
            tx.rollback().await.map_err(store_failure)?;
            return Err(store_failure(cause));
        }
        tx.commit().await.map_err(store_failure)?;
        info!(%enrollment_id, "course access granted");
        Ok(())
    }
}

#[async_trait]
impl JobHandler for EnrollmentJobService {
    async fn handle(&self, job: &EnrollmentJob) -> Result<(), Error> {
        match *job {
            EnrollmentJob::SendWelcomeNotification { enrollment_id } => {
                self.send_welcome(enrollment_id).await
            }
            EnrollmentJob::SetupCourseAccess { enrollment_id } => {
                self.setup_access(enrollment_id).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::domain::course::fixtures::{published_course, two_lesson_outline};
    use crate::domain::ports::{MockEnrollmentNotifier, NotifierError};
    use crate::domain::{
        CourseId, Enrollment, EnrollmentOptions, ErrorCode, Student, StudentDraft,
    };
    use crate::outbound::memory::MemoryEnrollmentStore;
    use crate::test_support::MutableClock;

    async fn seeded(start_immediately: bool) -> (MemoryEnrollmentStore, Enrollment) {
        let store = MemoryEnrollmentStore::new();
        store
            .seed_course(published_course(1, 3), two_lesson_outline())
            .expect("seed");
        let now = Utc::now();
        let student = Student::register(
            StudentDraft {
                email: "ada@example.com".to_owned(),
                first_name: "Ada".to_owned(),
                last_name: "Lovelace".to_owned(),
                phone: None,
                preferences: None,
            },
            now,
        )
        .expect("student");
        let enrollment = Enrollment::open(
            student.id(),
            CourseId::new(1),
            EnrollmentOptions {
                start_immediately,
                ..EnrollmentOptions::default()
            },
            json!({}),
            now,
        );
        let mut tx = store.begin().await.expect("begin");
        tx.insert_student(&student).await.expect("student");
        tx.insert_enrollment(&enrollment).await.expect("enrollment");
        tx.commit().await.expect("commit");
        (store, enrollment)
    }

    fn service(store: MemoryEnrollmentStore, notifier: MockEnrollmentNotifier) -> EnrollmentJobService {
        let clock = MutableClock::new(
            Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0)
                .single()
                .expect("valid time"),
        );
        EnrollmentJobService::new(Arc::new(store), Arc::new(notifier), Arc::new(clock))
    }

    async fn status(store: &MemoryEnrollmentStore, id: EnrollmentId) -> EnrollmentStatus {
        store
            .find_enrollment_detail(id)
            .await
            .expect("read")
            .expect("enrollment exists")
            .enrollment
            .status()
    }

    #[tokio::test]
    async fn welcome_notice_carries_student_and_course() {
        let (store, enrollment) = seeded(false).await;
        let mut notifier = MockEnrollmentNotifier::new();
        let expected_id = enrollment.id();
        notifier
            .expect_send_welcome()
            .times(1)
            .withf(move |notice: &WelcomeNotice| {
                notice.enrollment_id == expected_id
                    && notice.student.email == "ada@example.com"
                    && notice.course.id == CourseId::new(1)
            })
            .returning(|_| Ok(()));

        service(store, notifier)
            .handle(&EnrollmentJob::SendWelcomeNotification {
                enrollment_id: enrollment.id(),
            })
            .await
            .expect("welcome sent");
    }

    #[tokio::test]
    async fn welcome_for_missing_enrollment_fails() {
        let (store, _) = seeded(false).await;
        let mut notifier = MockEnrollmentNotifier::new();
        notifier.expect_send_welcome().times(0);

        let error = service(store, notifier)
            .handle(&EnrollmentJob::SendWelcomeNotification {
                enrollment_id: EnrollmentId::random(),
            })
            .await
            .expect_err("missing enrollment");

        assert_eq!(error.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn notifier_failures_fail_the_job() {
        let (store, enrollment) = seeded(false).await;
        let mut notifier = MockEnrollmentNotifier::new();
        notifier
            .expect_send_welcome()
            .returning(|_| Err(NotifierError::delivery("smtp timeout")));

        let error = service(store, notifier)
            .handle(&EnrollmentJob::SendWelcomeNotification {
                enrollment_id: enrollment.id(),
            })
            .await
            .expect_err("delivery failed");

        assert_eq!(error.code(), ErrorCode::ServiceUnavailable);
    }

    #[rstest]
    #[case::pending(false, EnrollmentStatus::Active)]
    #[case::already_active(true, EnrollmentStatus::Active)]
    #[tokio::test]
    async fn setup_access_activates_pending_enrollments(
        #[case] start_immediately: bool,
        #[case] expected: EnrollmentStatus,
    ) {
        let (store, enrollment) = seeded(start_immediately).await;
        let jobs = service(store.clone(), MockEnrollmentNotifier::new());

        jobs.handle(&EnrollmentJob::SetupCourseAccess {
            enrollment_id: enrollment.id(),
        })
        .await
        .expect("setup succeeds");

        assert_eq!(status(&store, enrollment.id()).await, expected);
    }

    #[tokio::test]
    async fn setup_access_for_missing_enrollment_fails() {
        let (store, _) = seeded(false).await;

        let error = service(store, MockEnrollmentNotifier::new())
            .handle(&EnrollmentJob::SetupCourseAccess {
                enrollment_id: EnrollmentId::random(),
            })
            .await
            .expect_err("missing");

        assert_eq!(error.code(), ErrorCode::NotFound);
    }
}
