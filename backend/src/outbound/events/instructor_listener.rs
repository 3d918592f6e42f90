//! Listener notifying instructors about new enrollments.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::domain::ports::{EnrollmentNotifier, InstructorNotice};
use crate::domain::{EnrollmentCreated, EnrollmentEvent};

/// Consumes [`EnrollmentEvent::Created`] and, when requested, tells the
/// course instructor.
pub struct InstructorNotificationListener {
    events: broadcast::Receiver<EnrollmentEvent>,
    notifier: Arc<dyn EnrollmentNotifier>,
}

impl InstructorNotificationListener {
    pub fn new(
        events: broadcast::Receiver<EnrollmentEvent>,
        notifier: Arc<dyn EnrollmentNotifier>,
    ) -> Self {
        Self { events, notifier }
    }

    /// Listen until the bus is dropped.
    pub async fn run(mut self) {
        loop {
            match self.events.recv().await {
                Ok(EnrollmentEvent::Created(created)) => self.on_created(created).await,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "instructor listener fell behind; events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("instructor listener stopped");
    }

    async fn on_created(&self, created: EnrollmentCreated) {
        if !created.notify_instructor {
            return;
        }
        let Some(instructor_email) = created.course.instructor_email.clone() else {
            debug!(enrollment_id = %created.enrollment_id, "course has no instructor contact");
            return;
        };
        let notice = InstructorNotice {
            enrollment_id: created.enrollment_id,
            instructor_email,
            student: created.student,
            course: created.course,
        };
        match self.notifier.notify_instructor(&notice).await {
            Ok(()) => info!(enrollment_id = %notice.enrollment_id, "instructor notified"),
            Err(cause) => warn!(
                enrollment_id = %notice.enrollment_id,
                error = %cause,
                "instructor notification failed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rstest::rstest;

    use super::*;
    use crate::domain::ports::{EnrollmentEventPublisher, MockEnrollmentNotifier, NotifierError};
    use crate::domain::{CourseId, CourseSummary, EnrollmentId, StudentId, StudentSummary};
    use crate::outbound::events::BroadcastEventBus;

    fn created(notify_instructor: bool, instructor_email: Option<&str>) -> EnrollmentEvent {
        EnrollmentEvent::Created(EnrollmentCreated {
            enrollment_id: EnrollmentId::random(),
            student: StudentSummary {
                id: StudentId::random(),
                email: "ada@example.com".to_owned(),
                full_name: "Ada Lovelace".to_owned(),
            },
            course: CourseSummary {
                id: CourseId::new(1),
                title: "Advanced Laravel Development".to_owned(),
                instructor_email: instructor_email.map(str::to_owned),
            },
            notify_instructor,
            occurred_at: Utc::now(),
        })
    }

    async fn deliver(events: Vec<EnrollmentEvent>, notifier: MockEnrollmentNotifier) {
        let bus = BroadcastEventBus::new(8);
        let listener = InstructorNotificationListener::new(bus.subscribe(), Arc::new(notifier));
        for event in events {
            bus.publish(event).await.expect("publish");
        }
        drop(bus);
        listener.run().await;
    }

    #[rstest]
    #[tokio::test]
    async fn notifies_the_instructor_when_requested() {
        let mut notifier = MockEnrollmentNotifier::new();
        notifier
            .expect_notify_instructor()
            .times(1)
            .withf(|notice: &InstructorNotice| {
                notice.instructor_email == "instructor@example.com"
                    && notice.student.email == "ada@example.com"
            })
            .returning(|_| Ok(()));

        deliver(vec![created(true, Some("instructor@example.com"))], notifier).await;
    }

    #[rstest]
    #[case::not_requested(created(false, Some("instructor@example.com")))]
    #[case::no_contact(created(true, None))]
    #[tokio::test]
    async fn skips_when_nobody_should_be_told(#[case] event: EnrollmentEvent) {
        let mut notifier = MockEnrollmentNotifier::new();
        notifier.expect_notify_instructor().times(0);

        deliver(vec![event], notifier).await;
    }

    #[rstest]
    #[tokio::test]
    async fn delivery_failures_do_not_stop_the_listener() {
        let mut notifier = MockEnrollmentNotifier::new();
        notifier
            .expect_notify_instructor()
            .times(2)
            .returning(|_| Err(NotifierError::delivery("smtp timeout")));

        deliver(
            vec![
                created(true, Some("instructor@example.com")),
                created(true, Some("instructor@example.com")),
            ],
            notifier,
        )
        .await;
    }
}
