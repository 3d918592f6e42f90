//! Enrollment aggregate, lifecycle state machine and lesson progress.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{CourseId, CourseOutline, LessonId, ModuleId, StudentId, UnknownStatus};

/// Length of course access granted when an enrollment starts.
pub const ACCESS_PERIOD_MONTHS: u32 = 12;

/// Enrollment identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnrollmentId(Uuid);

impl EnrollmentId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for EnrollmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle status.
///
/// `pending -> active -> completed`, `pending|active -> cancelled`,
/// `active -> expired`. The last three are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
    Expired,
}

impl EnrollmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Expired)
    }

    /// Whether the state machine allows `self -> next`.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Active)
                | (Self::Active, Self::Completed)
                | (Self::Pending | Self::Active, Self::Cancelled)
                | (Self::Active, Self::Expired)
        )
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnrollmentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            other => Err(UnknownStatus(other.to_owned())),
        }
    }
}

/// Rejected status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("enrollment cannot move from {from} to {to}")]
pub struct TransitionError {
    pub from: EnrollmentStatus,
    pub to: EnrollmentStatus,
}

/// Flags supplied with an enrollment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrollmentOptions {
    pub start_immediately: bool,
    pub send_welcome_email: bool,
    pub notify_instructor: bool,
}

impl Default for EnrollmentOptions {
    fn default() -> Self {
        Self {
            start_immediately: false,
            send_welcome_email: true,
            notify_instructor: true,
        }
    }
}

/// Persisted enrollment fields, used to rebuild the aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentParts {
    pub id: EnrollmentId,
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub status: EnrollmentStatus,
    pub enrolled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub send_welcome_email: bool,
    pub notify_instructor: bool,
    pub metadata: Value,
}

/// Student's enrollment in a course.
#[derive(Debug, Clone, PartialEq)]
pub struct Enrollment {
    parts: EnrollmentParts,
}

fn access_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_add_months(Months::new(ACCESS_PERIOD_MONTHS))
        .unwrap_or_else(|| now + Duration::days(365))
}

impl Enrollment {
    /// Create a fresh enrollment. With `start_immediately` it is active
    /// with a one-year access window, otherwise pending.
    pub fn open(
        student_id: StudentId,
        course_id: CourseId,
        options: EnrollmentOptions,
        metadata: Value,
        now: DateTime<Utc>,
    ) -> Self {
        let (status, started_at, expires_at) = if options.start_immediately {
            (EnrollmentStatus::Active, Some(now), Some(access_expiry(now)))
        } else {
            (EnrollmentStatus::Pending, None, None)
        };
        Self {
            parts: EnrollmentParts {
                id: EnrollmentId::random(),
                student_id,
                course_id,
                status,
                enrolled_at: now,
                started_at,
                completed_at: None,
                cancelled_at: None,
                expires_at,
                send_welcome_email: options.send_welcome_email,
                notify_instructor: options.notify_instructor,
                metadata,
            },
        }
    }

    pub fn from_parts(parts: EnrollmentParts) -> Self {
        Self { parts }
    }

    pub fn parts(&self) -> &EnrollmentParts {
        &self.parts
    }

    pub fn id(&self) -> EnrollmentId {
        self.parts.id
    }

    pub fn student_id(&self) -> StudentId {
        self.parts.student_id
    }

    pub fn course_id(&self) -> CourseId {
        self.parts.course_id
    }

    pub fn status(&self) -> EnrollmentStatus {
        self.parts.status
    }

    pub fn enrolled_at(&self) -> DateTime<Utc> {
        self.parts.enrolled_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.parts.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.parts.completed_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.parts.cancelled_at
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.parts.expires_at
    }

    pub fn send_welcome_email(&self) -> bool {
        self.parts.send_welcome_email
    }

    pub fn notify_instructor(&self) -> bool {
        self.parts.notify_instructor
    }

    pub fn metadata(&self) -> &Value {
        &self.parts.metadata
    }

    fn transition(&mut self, to: EnrollmentStatus) -> Result<(), TransitionError> {
        let from = self.parts.status;
        if !from.can_transition_to(to) {
            return Err(TransitionError { from, to });
        }
        self.parts.status = to;
        Ok(())
    }

    /// `pending -> active`, opening the access window.
    pub fn activate(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.transition(EnrollmentStatus::Active)?;
        self.parts.started_at = Some(now);
        self.parts.expires_at = Some(access_expiry(now));
        Ok(())
    }

    /// `active -> completed`.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.transition(EnrollmentStatus::Completed)?;
        self.parts.completed_at = Some(now);
        Ok(())
    }

    /// `pending|active -> cancelled`.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.transition(EnrollmentStatus::Cancelled)?;
        self.parts.cancelled_at = Some(now);
        Ok(())
    }

    /// `active -> expired`.
    pub fn expire(&mut self) -> Result<(), TransitionError> {
        self.transition(EnrollmentStatus::Expired)
    }

    /// Whether an active enrollment's access window has passed.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.parts.status == EnrollmentStatus::Active
            && self.parts.expires_at.is_some_and(|at| at <= now)
    }
}

/// Lesson progress row owned by an enrollment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonProgress {
    pub id: Uuid,
    pub enrollment_id: EnrollmentId,
    pub lesson_id: LessonId,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl LessonProgress {
    /// Incomplete progress row for a newly unlocked lesson.
    pub fn unlocked(enrollment_id: EnrollmentId, lesson_id: LessonId) -> Self {
        Self {
            id: Uuid::new_v4(),
            enrollment_id,
            lesson_id,
            is_completed: false,
            completed_at: None,
        }
    }

    /// Mark complete; repeated calls keep the first timestamp.
    pub fn mark_complete(&mut self, now: DateTime<Utc>) {
        if !self.is_completed {
            self.is_completed = true;
            self.completed_at = Some(now);
        }
    }
}

/// Lessons a request asks to unlock in one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleUnlock {
    pub module_id: ModuleId,
    pub lessons: Vec<LessonId>,
}

/// Unlock plan validation failures, positioned for field-level reporting.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnlockPlanError {
    #[error("module {module_id} does not belong to the course")]
    UnknownModule { index: usize, module_id: ModuleId },
    #[error("lesson {lesson_id} does not belong to module {module_id}")]
    UnknownLesson {
        module_index: usize,
        lesson_index: usize,
        module_id: ModuleId,
        lesson_id: LessonId,
    },
}

/// Requested lesson unlocks for a new enrollment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnlockPlan {
    modules: Vec<ModuleUnlock>,
}

impl UnlockPlan {
    pub fn new(modules: Vec<ModuleUnlock>) -> Self {
        Self { modules }
    }

    pub fn is_empty(&self) -> bool {
        self.modules.iter().all(|m| m.lessons.is_empty())
    }

    pub fn modules(&self) -> &[ModuleUnlock] {
        &self.modules
    }

    /// Check every module and lesson against the outline and return the
    /// distinct lessons in request order.
    pub fn resolve(&self, outline: &CourseOutline) -> Result<Vec<LessonId>, UnlockPlanError> {
        let mut seen = HashSet::new();
        let mut lessons = Vec::new();
        for (index, unlock) in self.modules.iter().enumerate() {
            if outline.module(unlock.module_id).is_none() {
                return Err(UnlockPlanError::UnknownModule {
                    index,
                    module_id: unlock.module_id,
                });
            }
            for (lesson_index, lesson_id) in unlock.lessons.iter().enumerate() {
                if !outline.contains_lesson(unlock.module_id, *lesson_id) {
                    return Err(UnlockPlanError::UnknownLesson {
                        module_index: index,
                        lesson_index,
                        module_id: unlock.module_id,
                        lesson_id: *lesson_id,
                    });
                }
                if seen.insert(*lesson_id) {
                    lessons.push(*lesson_id);
                }
            }
        }
        Ok(lessons)
    }
}
