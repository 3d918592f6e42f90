//! Port for transactional enrollment persistence.
//!
//! [`EnrollmentStore::begin`] opens a store transaction. Every write goes
//! through the returned [`EnrollmentTransaction`] and becomes visible to other
//! readers only after [`EnrollmentTransaction::commit`] succeeds. Dropping a
//! transaction without committing discards its writes.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Course, CourseId, CourseOutline, EmailAddress, Enrollment, EnrollmentId, LessonProgress,
    Payment, Student, StudentId,
};

use super::define_port_error;

/// Unique constraint that rejected a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueTarget {
    StudentEmail,
    StudentCourse,
    LessonProgress,
    Other,
}

impl UniqueTarget {
    /// Map a database constraint name onto a target.
    pub fn from_constraint(name: &str) -> Self {
        match name {
            "students_email_key" => Self::StudentEmail,
            "enrollments_student_id_course_id_key" => Self::StudentCourse,
            "lesson_progress_enrollment_id_lesson_id_key" => Self::LessonProgress,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for UniqueTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::StudentEmail => "student email",
            Self::StudentCourse => "student and course",
            Self::LessonProgress => "enrollment and lesson",
            Self::Other => "unknown constraint",
        })
    }
}

define_port_error! {
    /// Errors raised by enrollment store adapters.
    pub enum EnrollmentStoreError {
        /// Connection could not be established or was lost.
        Connection { message: String } =>
            "enrollment store connection failed: {message}",
        /// Deadlock, serialization failure or lock timeout; safe to retry.
        Transient { message: String } =>
            "enrollment store transient failure: {message}",
        /// A unique constraint rejected the write.
        Conflict { target: UniqueTarget } =>
            "enrollment store unique constraint violated: {target}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "enrollment store query failed: {message}",
    }
}

impl EnrollmentStoreError {
    /// Whether a fresh attempt may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Enrollment together with everything it references.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentDetail {
    pub enrollment: Enrollment,
    pub student: Student,
    pub course: Course,
    pub payment: Option<Payment>,
    pub progress: Vec<LessonProgress>,
}

/// Open store transaction.
#[async_trait]
pub trait EnrollmentTransaction: Send {
    async fn find_student_by_email(
        &mut self,
        email: &EmailAddress,
    ) -> Result<Option<Student>, EnrollmentStoreError>;

    async fn insert_student(&mut self, student: &Student) -> Result<(), EnrollmentStoreError>;

    /// Read the course and hold an exclusive lock on its row until the
    /// transaction ends.
    async fn lock_course(&mut self, id: CourseId) -> Result<Option<Course>, EnrollmentStoreError>;

    /// Persist the seat counters of a locked course.
    async fn update_course_seats(&mut self, course: &Course) -> Result<(), EnrollmentStoreError>;

    async fn has_enrollment(
        &mut self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<bool, EnrollmentStoreError>;

    async fn find_enrollment(
        &mut self,
        id: EnrollmentId,
    ) -> Result<Option<Enrollment>, EnrollmentStoreError>;

    /// Read the enrollment and hold an exclusive lock on its row.
    async fn lock_enrollment(
        &mut self,
        id: EnrollmentId,
    ) -> Result<Option<Enrollment>, EnrollmentStoreError>;

    async fn insert_enrollment(&mut self, enrollment: &Enrollment)
    -> Result<(), EnrollmentStoreError>;

    async fn update_enrollment(&mut self, enrollment: &Enrollment)
    -> Result<(), EnrollmentStoreError>;

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), EnrollmentStoreError>;

    async fn update_payment(&mut self, payment: &Payment) -> Result<(), EnrollmentStoreError>;

    async fn find_payment(
        &mut self,
        enrollment_id: EnrollmentId,
    ) -> Result<Option<Payment>, EnrollmentStoreError>;

    async fn insert_lesson_progress(
        &mut self,
        rows: &[LessonProgress],
    ) -> Result<(), EnrollmentStoreError>;

    async fn lesson_progress(
        &mut self,
        enrollment_id: EnrollmentId,
    ) -> Result<Vec<LessonProgress>, EnrollmentStoreError>;

    async fn update_lesson_progress(
        &mut self,
        row: &LessonProgress,
    ) -> Result<(), EnrollmentStoreError>;

    /// Make every write visible and release locks.
    async fn commit(self: Box<Self>) -> Result<(), EnrollmentStoreError>;

    /// Discard every write and release locks.
    async fn rollback(self: Box<Self>) -> Result<(), EnrollmentStoreError>;
}

/// Port for committed-state enrollment reads and opening transactions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn EnrollmentTransaction>, EnrollmentStoreError>;

    /// Committed course row, without locking.
    async fn find_course(&self, id: CourseId) -> Result<Option<Course>, EnrollmentStoreError>;

    /// Committed module/lesson tree of a course.
    async fn course_outline(&self, id: CourseId) -> Result<CourseOutline, EnrollmentStoreError>;

    async fn find_enrollment_detail(
        &self,
        id: EnrollmentId,
    ) -> Result<Option<EnrollmentDetail>, EnrollmentStoreError>;

    /// Active enrollments whose access window ended at or before `now`.
    async fn overdue_enrollments(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<EnrollmentId>, EnrollmentStoreError>;

    /// Cheap round trip used by readiness checks.
    async fn ping(&self) -> Result<(), EnrollmentStoreError>;
}
