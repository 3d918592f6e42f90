//! Internal Diesel row structs and their conversions to domain types.
//!
//! Rows are implementation details of the persistence layer and never leave
//! it. Reads rebuild aggregates through their validating constructors so a
//! corrupt row surfaces as a [`RowDecodeError`] rather than a broken
//! invariant.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use super::schema::{
    course_modules, courses, enrollments, lesson_progress, lessons, payments, students,
};
use crate::domain::{
    Course, CourseDraft, CourseId, CourseModule, Currency, Enrollment, EnrollmentId,
    EnrollmentParts, Lesson, LessonId, LessonProgress, ModuleId, Money, Payment, PaymentId,
    Student, StudentDraft, StudentId,
};

/// A stored row failed domain validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {table} row {id}: {message}")]
pub(crate) struct RowDecodeError {
    table: &'static str,
    id: String,
    message: String,
}

impl RowDecodeError {
    fn new(table: &'static str, id: impl ToString, message: impl ToString) -> Self {
        Self {
            table,
            id: id.to_string(),
            message: message.to_string(),
        }
    }
}

/// Seat counters are `u32` in the domain and `INTEGER` in the schema.
fn seat_count(value: u32) -> Result<i32, RowDecodeError> {
    i32::try_from(value).map_err(|err| RowDecodeError::new("courses", value, err))
}

// ---------------------------------------------------------------------------
// Students
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = students)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct StudentRow {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub preferences: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl StudentRow {
    pub(crate) fn into_domain(self) -> Result<Student, RowDecodeError> {
        let id = self.id;
        Student::restore(
            StudentId::from_uuid(id),
            StudentDraft {
                email: self.email,
                first_name: self.first_name,
                last_name: self.last_name,
                phone: self.phone,
                preferences: Some(self.preferences),
            },
            self.created_at,
        )
        .map_err(|err| RowDecodeError::new("students", id, err))
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = students)]
pub(crate) struct NewStudentRow<'a> {
    pub id: Uuid,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub phone: Option<&'a str>,
    pub preferences: &'a serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'a> From<&'a Student> for NewStudentRow<'a> {
    fn from(student: &'a Student) -> Self {
        Self {
            id: *student.id().as_uuid(),
            email: student.email().as_ref(),
            first_name: student.first_name(),
            last_name: student.last_name(),
            phone: student.phone(),
            preferences: student.preferences(),
            created_at: student.created_at(),
            updated_at: student.created_at(),
        }
    }
}

// ---------------------------------------------------------------------------
// Courses and outlines
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = courses)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct CourseRow {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub discount_price_cents: Option<i64>,
    pub currency: String,
    pub available_slots: i32,
    pub max_students: i32,
    pub enrolled_count: i32,
    pub status: String,
    pub instructor_email: Option<String>,
}

impl CourseRow {
    pub(crate) fn into_domain(self) -> Result<Course, RowDecodeError> {
        let id = self.id;
        let invalid = |err: &dyn std::fmt::Display| RowDecodeError::new("courses", id, err);
        let money = |cents: i64| Money::from_cents(cents).map_err(|err| invalid(&err));
        let count = |value: i32| u32::try_from(value).map_err(|err| invalid(&err));

        Course::new(CourseDraft {
            id: CourseId::new(id),
            title: self.title,
            description: self.description,
            price: money(self.price_cents)?,
            discount_price: self.discount_price_cents.map(money).transpose()?,
            currency: Currency::new(&self.currency).map_err(|err| invalid(&err))?,
            available_slots: count(self.available_slots)?,
            max_students: count(self.max_students)?,
            enrolled_count: count(self.enrolled_count)?,
            status: self.status.parse().map_err(|err| invalid(&err))?,
            instructor_email: self.instructor_email,
        })
        .map_err(|err| invalid(&err))
    }
}

/// Seat counters written back after a reservation or release.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = courses)]
pub(crate) struct CourseSeatsUpdate {
    pub available_slots: i32,
    pub enrolled_count: i32,
}

impl TryFrom<&Course> for CourseSeatsUpdate {
    type Error = RowDecodeError;

    fn try_from(course: &Course) -> Result<Self, Self::Error> {
        Ok(Self {
            available_slots: seat_count(course.available_slots())?,
            enrolled_count: seat_count(course.enrolled_count())?,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = course_modules)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ModuleRow {
    pub id: i64,
    pub title: String,
    pub position: i32,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = lessons)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct LessonRow {
    pub id: i64,
    pub module_id: i64,
    pub title: String,
    pub position: i32,
}

/// Assemble module and lesson rows into ordered domain modules.
pub(crate) fn assemble_outline(modules: Vec<ModuleRow>, lessons: Vec<LessonRow>) -> Vec<CourseModule> {
    let mut assembled: Vec<CourseModule> = modules
        .into_iter()
        .map(|row| CourseModule {
            id: ModuleId::new(row.id),
            title: row.title,
            position: row.position,
            lessons: Vec::new(),
        })
        .collect();
    for lesson in lessons {
        let module_id = ModuleId::new(lesson.module_id);
        if let Some(module) = assembled.iter_mut().find(|m| m.id == module_id) {
            module.lessons.push(Lesson {
                id: LessonId::new(lesson.id),
                title: lesson.title,
                position: lesson.position,
            });
        }
    }
    assembled
}

// ---------------------------------------------------------------------------
// Enrollments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = enrollments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct EnrollmentRow {
    pub id: Uuid,
    pub student_id: Uuid,
    pub course_id: i64,
    pub status: String,
    pub enrolled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub send_welcome_email: bool,
    pub notify_instructor: bool,
    pub metadata: serde_json::Value,
}

impl EnrollmentRow {
    pub(crate) fn into_domain(self) -> Result<Enrollment, RowDecodeError> {
        let status = self
            .status
            .parse()
            .map_err(|err| RowDecodeError::new("enrollments", self.id, err))?;
        Ok(Enrollment::from_parts(EnrollmentParts {
            id: EnrollmentId::from_uuid(self.id),
            student_id: StudentId::from_uuid(self.student_id),
            course_id: CourseId::new(self.course_id),
            status,
            enrolled_at: self.enrolled_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            cancelled_at: self.cancelled_at,
            expires_at: self.expires_at,
            send_welcome_email: self.send_welcome_email,
            notify_instructor: self.notify_instructor,
            metadata: self.metadata,
        }))
    }
}

impl From<&Enrollment> for EnrollmentRow {
    fn from(enrollment: &Enrollment) -> Self {
        let parts = enrollment.parts();
        Self {
            id: *parts.id.as_uuid(),
            student_id: *parts.student_id.as_uuid(),
            course_id: parts.course_id.get(),
            status: parts.status.as_str().to_owned(),
            enrolled_at: parts.enrolled_at,
            started_at: parts.started_at,
            completed_at: parts.completed_at,
            cancelled_at: parts.cancelled_at,
            expires_at: parts.expires_at,
            send_welcome_email: parts.send_welcome_email,
            notify_instructor: parts.notify_instructor,
            metadata: parts.metadata.clone(),
        }
    }
}

/// Lifecycle columns rewritten on every status change.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = enrollments)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct EnrollmentStatusUpdate<'a> {
    pub status: &'a str,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl<'a> From<&'a Enrollment> for EnrollmentStatusUpdate<'a> {
    fn from(enrollment: &'a Enrollment) -> Self {
        Self {
            status: enrollment.status().as_str(),
            started_at: enrollment.started_at(),
            completed_at: enrollment.completed_at(),
            cancelled_at: enrollment.cancelled_at(),
            expires_at: enrollment.expires_at(),
        }
    }
}

// ---------------------------------------------------------------------------
// Payments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = payments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct PaymentRow {
    pub id: Uuid,
    pub enrollment_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub method: String,
    pub status: String,
    pub transaction_id: Option<String>,
    pub coupon_code: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PaymentRow {
    pub(crate) fn into_domain(self) -> Result<Payment, RowDecodeError> {
        let id = self.id;
        let invalid = |err: &dyn std::fmt::Display| RowDecodeError::new("payments", id, err);
        Ok(Payment {
            id: PaymentId::from_uuid(id),
            enrollment_id: EnrollmentId::from_uuid(self.enrollment_id),
            amount: Money::from_cents(self.amount_cents).map_err(|err| invalid(&err))?,
            currency: Currency::new(&self.currency).map_err(|err| invalid(&err))?,
            method: self.method.parse().map_err(|err| invalid(&err))?,
            status: self.status.parse().map_err(|err| invalid(&err))?,
            transaction_id: self.transaction_id,
            coupon_code: self.coupon_code,
            paid_at: self.paid_at,
            created_at: self.created_at,
        })
    }
}

impl From<&Payment> for PaymentRow {
    fn from(payment: &Payment) -> Self {
        Self {
            id: *payment.id.as_uuid(),
            enrollment_id: *payment.enrollment_id.as_uuid(),
            amount_cents: payment.amount.cents(),
            currency: payment.currency.as_str().to_owned(),
            method: payment.method.as_str().to_owned(),
            status: payment.status.as_str().to_owned(),
            transaction_id: payment.transaction_id.clone(),
            coupon_code: payment.coupon_code.clone(),
            paid_at: payment.paid_at,
            created_at: payment.created_at,
        }
    }
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = payments)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct PaymentStatusUpdate<'a> {
    pub status: &'a str,
    pub transaction_id: Option<&'a str>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl<'a> From<&'a Payment> for PaymentStatusUpdate<'a> {
    fn from(payment: &'a Payment) -> Self {
        Self {
            status: payment.status.as_str(),
            transaction_id: payment.transaction_id.as_deref(),
            paid_at: payment.paid_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Lesson progress
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = lesson_progress)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct LessonProgressRow {
    pub id: Uuid,
    pub enrollment_id: Uuid,
    pub lesson_id: i64,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<LessonProgressRow> for LessonProgress {
    fn from(row: LessonProgressRow) -> Self {
        Self {
            id: row.id,
            enrollment_id: EnrollmentId::from_uuid(row.enrollment_id),
            lesson_id: LessonId::new(row.lesson_id),
            is_completed: row.is_completed,
            completed_at: row.completed_at,
        }
    }
}

impl From<&LessonProgress> for LessonProgressRow {
    fn from(progress: &LessonProgress) -> Self {
        Self {
            id: progress.id,
            enrollment_id: *progress.enrollment_id.as_uuid(),
            lesson_id: progress.lesson_id.get(),
            is_completed: progress.is_completed,
            completed_at: progress.completed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::domain::{CourseStatus, EnrollmentOptions, EnrollmentStatus};

    fn course_row() -> CourseRow {
        CourseRow {
            id: 7,
            title: "Advanced Laravel Development".to_owned(),
            description: None,
            price_cents: 15_000,
            discount_price_cents: Some(12_000),
            currency: "USD".to_owned(),
            available_slots: 3,
            max_students: 30,
            enrolled_count: 27,
            status: "published".to_owned(),
            instructor_email: Some("instructor@example.com".to_owned()),
        }
    }

    #[rstest]
    fn course_rows_become_courses() {
        let course = course_row().into_domain().expect("valid row");
        assert_eq!(course.id(), CourseId::new(7));
        assert_eq!(course.effective_price().cents(), 12_000);
        assert_eq!(course.status(), CourseStatus::Published);
        assert_eq!(course.available_slots(), 3);
    }

    #[rstest]
    #[case::negative_slots(CourseRow { available_slots: -1, ..course_row() })]
    #[case::unknown_status(CourseRow { status: "hidden".to_owned(), ..course_row() })]
    #[case::bad_currency(CourseRow { currency: "usd".to_owned(), ..course_row() })]
    #[case::overbooked(CourseRow { available_slots: 31, ..course_row() })]
    fn corrupt_course_rows_are_rejected(#[case] row: CourseRow) {
        let error = row.into_domain().expect_err("corrupt row");
        assert!(error.to_string().starts_with("invalid courses row 7"));
    }

    #[rstest]
    fn enrollment_rows_preserve_lifecycle_columns() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).single().expect("time");
        let enrollment = Enrollment::open(
            StudentId::random(),
            CourseId::new(7),
            EnrollmentOptions {
                start_immediately: true,
                ..EnrollmentOptions::default()
            },
            json!({"source": "web"}),
            now,
        );

        let restored = EnrollmentRow::from(&enrollment)
            .into_domain()
            .expect("valid row");

        assert_eq!(restored, enrollment);
        assert_eq!(restored.status(), EnrollmentStatus::Active);
    }

    #[rstest]
    fn outlines_group_lessons_under_their_modules() {
        let modules = vec![
            ModuleRow { id: 1, title: "Basics".to_owned(), position: 1 },
            ModuleRow { id: 2, title: "Queues".to_owned(), position: 2 },
        ];
        let lessons = vec![
            LessonRow { id: 10, module_id: 2, title: "Workers".to_owned(), position: 1 },
            LessonRow { id: 11, module_id: 1, title: "Routing".to_owned(), position: 1 },
            LessonRow { id: 12, module_id: 9, title: "Orphan".to_owned(), position: 1 },
        ];

        let outline = assemble_outline(modules, lessons);

        assert_eq!(outline[0].lessons.len(), 1);
        assert_eq!(outline[0].lessons[0].id, LessonId::new(11));
        assert_eq!(outline[1].lessons[0].id, LessonId::new(10));
    }
}
