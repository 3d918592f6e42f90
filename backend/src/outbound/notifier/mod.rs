//! Notification adapters.

use async_trait::async_trait;
use tracing::info;

use crate::domain::ports::{EnrollmentNotifier, InstructorNotice, NotifierError, WelcomeNotice};

/// [`EnrollmentNotifier`] that writes notifications to the structured log.
///
/// Stands in for a mail transport; delivery always succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl EnrollmentNotifier for TracingNotifier {
    async fn send_welcome(&self, notice: &WelcomeNotice) -> Result<(), NotifierError> {
        info!(
            enrollment_id = %notice.enrollment_id,
            to = %notice.student.email,
            course = %notice.course.title,
            "welcome notification"
        );
        Ok(())
    }

    async fn notify_instructor(&self, notice: &InstructorNotice) -> Result<(), NotifierError> {
        info!(
            enrollment_id = %notice.enrollment_id,
            to = %notice.instructor_email,
            student = %notice.student.full_name,
            course = %notice.course.title,
            "instructor notification"
        );
        Ok(())
    }
}
