//! Background jobs scheduled after an enrollment commits.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::EnrollmentId;

/// Work handed to the job queue once the enrollment is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EnrollmentJob {
    /// Welcome the student to the course.
    SendWelcomeNotification { enrollment_id: EnrollmentId },
    /// Activate a pending enrollment.
    SetupCourseAccess { enrollment_id: EnrollmentId },
}

impl EnrollmentJob {
    pub fn enrollment_id(&self) -> EnrollmentId {
        match self {
            Self::SendWelcomeNotification { enrollment_id }
            | Self::SetupCourseAccess { enrollment_id } => *enrollment_id,
        }
    }

    /// Stable job name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SendWelcomeNotification { .. } => "send_welcome_notification",
            Self::SetupCourseAccess { .. } => "setup_course_access",
        }
    }
}

impl fmt::Display for EnrollmentJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.enrollment_id())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn serialises_with_type_tag() {
        let id = EnrollmentId::from_uuid(Uuid::nil());
        let job = EnrollmentJob::SetupCourseAccess { enrollment_id: id };
        let value = serde_json::to_value(job).expect("serialise");
        assert_eq!(
            value,
            json!({"type": "setup_course_access", "enrollment_id": Uuid::nil()})
        );
        assert_eq!(
            job.to_string(),
            format!("setup_course_access({})", Uuid::nil())
        );
    }
}
