//! Domain events published after enrollment transactions commit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Course, CourseId, EnrollmentId, LessonId, Student, StudentId};

/// Student fields carried on events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub id: StudentId,
    pub email: String,
    pub full_name: String,
}

impl From<&Student> for StudentSummary {
    fn from(student: &Student) -> Self {
        Self {
            id: student.id(),
            email: student.email().to_string(),
            full_name: student.full_name(),
        }
    }
}

/// Course fields carried on events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    pub id: CourseId,
    pub title: String,
    pub instructor_email: Option<String>,
}

impl From<&Course> for CourseSummary {
    fn from(course: &Course) -> Self {
        Self {
            id: course.id(),
            title: course.title().to_owned(),
            instructor_email: course.instructor_email().map(str::to_owned),
        }
    }
}

/// A student enrolled in a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentCreated {
    pub enrollment_id: EnrollmentId,
    pub student: StudentSummary,
    pub course: CourseSummary,
    pub notify_instructor: bool,
    pub occurred_at: DateTime<Utc>,
}

/// An enrollment was cancelled and its seat released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentCancelled {
    pub enrollment_id: EnrollmentId,
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub refunded: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Every unlocked lesson of an enrollment is complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentCompleted {
    pub enrollment_id: EnrollmentId,
    pub course_id: CourseId,
    pub last_lesson_id: LessonId,
    pub occurred_at: DateTime<Utc>,
}

/// Events consumed by out-of-band listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EnrollmentEvent {
    Created(EnrollmentCreated),
    Cancelled(EnrollmentCancelled),
    Completed(EnrollmentCompleted),
}

impl EnrollmentEvent {
    pub fn enrollment_id(&self) -> EnrollmentId {
        match self {
            Self::Created(event) => event.enrollment_id,
            Self::Cancelled(event) => event.enrollment_id,
            Self::Completed(event) => event.enrollment_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Created(_) => "enrollment_created",
            Self::Cancelled(_) => "enrollment_cancelled",
            Self::Completed(_) => "enrollment_completed",
        }
    }
}
