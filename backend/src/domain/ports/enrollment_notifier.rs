//! Port for student and instructor notifications.

use async_trait::async_trait;

use crate::domain::{CourseSummary, EnrollmentId, StudentSummary};

use super::define_port_error;

define_port_error! {
    /// Errors raised by notification adapters.
    pub enum NotifierError {
        /// Delivery failed.
        Delivery { message: String } => "notification delivery failed: {message}",
    }
}

/// Welcome message for a newly enrolled student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WelcomeNotice {
    pub enrollment_id: EnrollmentId,
    pub student: StudentSummary,
    pub course: CourseSummary,
}

/// Notice that a student joined an instructor's course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructorNotice {
    pub enrollment_id: EnrollmentId,
    pub instructor_email: String,
    pub student: StudentSummary,
    pub course: CourseSummary,
}

/// Outbound notification channel.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EnrollmentNotifier: Send + Sync {
    async fn send_welcome(&self, notice: &WelcomeNotice) -> Result<(), NotifierError>;

    async fn notify_instructor(&self, notice: &InstructorNotice) -> Result<(), NotifierError>;
}
