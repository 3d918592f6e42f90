//! PostgreSQL-backed `EnrollmentStore`.
//!
//! Each [`EnrollmentTransaction`] owns a pooled connection with an open
//! transaction. Row locks use `SELECT ... FOR UPDATE` and are bounded by a
//! per-transaction `lock_timeout`, whose expiry maps to a transient error.
//! A transaction dropped without commit or rollback returns its connection
//! mid-transaction; the pool discards such connections, which aborts the
//! transaction server-side.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::pooled_connection::bb8::PooledConnection;
use diesel_async::{AnsiTransactionManager, AsyncPgConnection, RunQueryDsl, TransactionManager};
use tracing::{debug, warn};
use uuid::Uuid;

use super::diesel_course_catalogue_repository::{load_course, load_outline};
use super::error_mapping::{map_store_decode_error, map_store_error, map_store_pool_error};
use super::models::{
    CourseRow, CourseSeatsUpdate, EnrollmentRow, EnrollmentStatusUpdate, LessonProgressRow,
    NewStudentRow, PaymentRow, PaymentStatusUpdate, StudentRow,
};
use super::pool::DbPool;
use super::schema::{courses, enrollments, lesson_progress, payments, students};
use crate::domain::ports::{
    EnrollmentDetail, EnrollmentStore, EnrollmentStoreError, EnrollmentTransaction,
};
use crate::domain::{
    Course, CourseId, CourseOutline, EmailAddress, Enrollment, EnrollmentId, EnrollmentStatus,
    LessonProgress, Payment, Student, StudentId,
};

/// Diesel-backed enrollment store.
#[derive(Clone)]
pub struct DieselEnrollmentStore {
    pool: DbPool,
    lock_timeout: Duration,
}

impl DieselEnrollmentStore {
    /// Store with a 5 second row lock timeout.
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            lock_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }
}

fn expect_one_row(updated: usize, table: &str) -> Result<(), EnrollmentStoreError> {
    if updated == 1 {
        Ok(())
    } else {
        Err(EnrollmentStoreError::query(format!(
            "expected to update one {table} row, updated {updated}"
        )))
    }
}

fn course_from_row(row: Option<CourseRow>) -> Result<Option<Course>, EnrollmentStoreError> {
    row.map(CourseRow::into_domain)
        .transpose()
        .map_err(map_store_decode_error)
}

#[async_trait]
impl EnrollmentStore for DieselEnrollmentStore {
    async fn begin(&self) -> Result<Box<dyn EnrollmentTransaction>, EnrollmentStoreError> {
        let mut conn = self.pool.get_owned().await.map_err(map_store_pool_error)?;
        AnsiTransactionManager::begin_transaction(&mut *conn)
            .await
            .map_err(map_store_error)?;
        let mut tx = DieselTransaction { conn };

        let timeout_ms = u64::try_from(self.lock_timeout.as_millis()).unwrap_or(u64::MAX);
        let set_timeout = diesel::sql_query(format!("SET LOCAL lock_timeout = '{timeout_ms}ms'"))
            .execute(tx.conn())
            .await
            .map_err(map_store_error);
        if let Err(cause) = set_timeout {
            Box::new(tx).rollback().await?;
            return Err(cause);
        }
        Ok(Box::new(tx))
    }

    async fn find_course(&self, id: CourseId) -> Result<Option<Course>, EnrollmentStoreError> {
        let mut conn = self.pool.get().await.map_err(map_store_pool_error)?;
        course_from_row(load_course(&mut conn, id).await.map_err(map_store_error)?)
    }

    async fn course_outline(&self, id: CourseId) -> Result<CourseOutline, EnrollmentStoreError> {
        let mut conn = self.pool.get().await.map_err(map_store_pool_error)?;
        load_outline(&mut conn, id).await.map_err(map_store_error)
    }

    async fn find_enrollment_detail(
        &self,
        id: EnrollmentId,
    ) -> Result<Option<EnrollmentDetail>, EnrollmentStoreError> {
        let mut conn = self.pool.get().await.map_err(map_store_pool_error)?;

        let Some(enrollment) = enrollments::table
            .find(*id.as_uuid())
            .select(EnrollmentRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_store_error)?
        else {
            return Ok(None);
        };
        let enrollment = enrollment.into_domain().map_err(map_store_decode_error)?;

        let student = students::table
            .find(*enrollment.student_id().as_uuid())
            .select(StudentRow::as_select())
            .first(&mut conn)
            .await
            .map_err(map_store_error)?
            .into_domain()
            .map_err(map_store_decode_error)?;
        let course = course_from_row(
            load_course(&mut conn, enrollment.course_id())
                .await
                .map_err(map_store_error)?,
        )?
        .ok_or_else(|| EnrollmentStoreError::query("enrollment references a missing course"))?;
        let payment = payments::table
            .filter(payments::enrollment_id.eq(*id.as_uuid()))
            .select(PaymentRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_store_error)?
            .map(PaymentRow::into_domain)
            .transpose()
            .map_err(map_store_decode_error)?;
        let progress = lesson_progress::table
            .filter(lesson_progress::enrollment_id.eq(*id.as_uuid()))
            .order(lesson_progress::lesson_id)
            .select(LessonProgressRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_store_error)?
            .into_iter()
            .map(LessonProgress::from)
            .collect();

        Ok(Some(EnrollmentDetail {
            enrollment,
            student,
            course,
            payment,
            progress,
        }))
    }

    async fn overdue_enrollments(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<EnrollmentId>, EnrollmentStoreError> {
        let mut conn = self.pool.get().await.map_err(map_store_pool_error)?;
        let ids: Vec<Uuid> = enrollments::table
            .filter(enrollments::status.eq(EnrollmentStatus::Active.as_str()))
            .filter(enrollments::expires_at.le(now))
            .order(enrollments::id)
            .select(enrollments::id)
            .load(&mut conn)
            .await
            .map_err(map_store_error)?;
        Ok(ids.into_iter().map(EnrollmentId::from_uuid).collect())
    }

    async fn ping(&self) -> Result<(), EnrollmentStoreError> {
        let mut conn = self.pool.get().await.map_err(map_store_pool_error)?;
        diesel::sql_query("SELECT 1")
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_store_error)
    }
}

struct DieselTransaction {
    conn: PooledConnection<'static, AsyncPgConnection>,
}

impl DieselTransaction {
    fn conn(&mut self) -> &mut AsyncPgConnection {
        &mut self.conn
    }

    async fn select_enrollment(
        &mut self,
        id: EnrollmentId,
        for_update: bool,
    ) -> Result<Option<Enrollment>, EnrollmentStoreError> {
        let query = enrollments::table
            .find(*id.as_uuid())
            .select(EnrollmentRow::as_select());
        let row = if for_update {
            query.for_update().first(self.conn()).await
        } else {
            query.first(self.conn()).await
        }
        .optional()
        .map_err(map_store_error)?;
        row.map(EnrollmentRow::into_domain)
            .transpose()
            .map_err(map_store_decode_error)
    }
}

#[async_trait]
impl EnrollmentTransaction for DieselTransaction {
    async fn find_student_by_email(
        &mut self,
        email: &EmailAddress,
    ) -> Result<Option<Student>, EnrollmentStoreError> {
        students::table
            .filter(students::email.eq(email.as_ref()))
            .select(StudentRow::as_select())
            .first(self.conn())
            .await
            .optional()
            .map_err(map_store_error)?
            .map(StudentRow::into_domain)
            .transpose()
            .map_err(map_store_decode_error)
    }

    async fn insert_student(&mut self, student: &Student) -> Result<(), EnrollmentStoreError> {
        diesel::insert_into(students::table)
            .values(NewStudentRow::from(student))
            .execute(self.conn())
            .await
            .map(|_| ())
            .map_err(map_store_error)
    }

    async fn lock_course(&mut self, id: CourseId) -> Result<Option<Course>, EnrollmentStoreError> {
        let row = courses::table
            .find(id.get())
            .select(CourseRow::as_select())
            .for_update()
            .first(self.conn())
            .await
            .optional()
            .map_err(map_store_error)?;
        debug!(course_id = %id, found = row.is_some(), "course row locked");
        course_from_row(row)
    }

    async fn update_course_seats(&mut self, course: &Course) -> Result<(), EnrollmentStoreError> {
        let seats = CourseSeatsUpdate::try_from(course).map_err(map_store_decode_error)?;
        let updated = diesel::update(courses::table.find(course.id().get()))
            .set((&seats, courses::updated_at.eq(diesel::dsl::now)))
            .execute(self.conn())
            .await
            .map_err(map_store_error)?;
        expect_one_row(updated, "courses")
    }

    async fn has_enrollment(
        &mut self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<bool, EnrollmentStoreError> {
        diesel::select(diesel::dsl::exists(
            enrollments::table
                .filter(enrollments::student_id.eq(*student_id.as_uuid()))
                .filter(enrollments::course_id.eq(course_id.get())),
        ))
        .get_result(self.conn())
        .await
        .map_err(map_store_error)
    }

    async fn find_enrollment(
        &mut self,
        id: EnrollmentId,
    ) -> Result<Option<Enrollment>, EnrollmentStoreError> {
        self.select_enrollment(id, false).await
    }

    async fn lock_enrollment(
        &mut self,
        id: EnrollmentId,
    ) -> Result<Option<Enrollment>, EnrollmentStoreError> {
        self.select_enrollment(id, true).await
    }

    async fn insert_enrollment(
        &mut self,
        enrollment: &Enrollment,
    ) -> Result<(), EnrollmentStoreError> {
        diesel::insert_into(enrollments::table)
            .values(EnrollmentRow::from(enrollment))
            .execute(self.conn())
            .await
            .map(|_| ())
            .map_err(map_store_error)
    }

    async fn update_enrollment(
        &mut self,
        enrollment: &Enrollment,
    ) -> Result<(), EnrollmentStoreError> {
        let updated = diesel::update(enrollments::table.find(*enrollment.id().as_uuid()))
            .set(EnrollmentStatusUpdate::from(enrollment))
            .execute(self.conn())
            .await
            .map_err(map_store_error)?;
        expect_one_row(updated, "enrollments")
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), EnrollmentStoreError> {
        diesel::insert_into(payments::table)
            .values(PaymentRow::from(payment))
            .execute(self.conn())
            .await
            .map(|_| ())
            .map_err(map_store_error)
    }

    async fn update_payment(&mut self, payment: &Payment) -> Result<(), EnrollmentStoreError> {
        let updated = diesel::update(payments::table.find(*payment.id.as_uuid()))
            .set(PaymentStatusUpdate::from(payment))
            .execute(self.conn())
            .await
            .map_err(map_store_error)?;
        expect_one_row(updated, "payments")
    }

    async fn find_payment(
        &mut self,
        enrollment_id: EnrollmentId,
    ) -> Result<Option<Payment>, EnrollmentStoreError> {
        payments::table
            .filter(payments::enrollment_id.eq(*enrollment_id.as_uuid()))
            .select(PaymentRow::as_select())
            .first(self.conn())
            .await
            .optional()
            .map_err(map_store_error)?
            .map(PaymentRow::into_domain)
            .transpose()
            .map_err(map_store_decode_error)
    }

    async fn insert_lesson_progress(
        &mut self,
        rows: &[LessonProgress],
    ) -> Result<(), EnrollmentStoreError> {
        if rows.is_empty() {
            return Ok(());
        }
        let rows: Vec<LessonProgressRow> = rows.iter().map(LessonProgressRow::from).collect();
        diesel::insert_into(lesson_progress::table)
            .values(&rows)
            .execute(self.conn())
            .await
            .map(|_| ())
            .map_err(map_store_error)
    }

    async fn lesson_progress(
        &mut self,
        enrollment_id: EnrollmentId,
    ) -> Result<Vec<LessonProgress>, EnrollmentStoreError> {
        let rows: Vec<LessonProgressRow> = lesson_progress::table
            .filter(lesson_progress::enrollment_id.eq(*enrollment_id.as_uuid()))
            .order(lesson_progress::lesson_id)
            .select(LessonProgressRow::as_select())
            .load(self.conn())
            .await
            .map_err(map_store_error)?;
        Ok(rows.into_iter().map(LessonProgress::from).collect())
    }

    async fn update_lesson_progress(
        &mut self,
        row: &LessonProgress,
    ) -> Result<(), EnrollmentStoreError> {
        let updated = diesel::update(lesson_progress::table.find(row.id))
            .set((
                lesson_progress::is_completed.eq(row.is_completed),
                lesson_progress::completed_at.eq(row.completed_at),
            ))
            .execute(self.conn())
            .await
            .map_err(map_store_error)?;
        expect_one_row(updated, "lesson_progress")
    }

    async fn commit(mut self: Box<Self>) -> Result<(), EnrollmentStoreError> {
        AnsiTransactionManager::commit_transaction(self.conn())
            .await
            .map_err(map_store_error)
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), EnrollmentStoreError> {
        AnsiTransactionManager::rollback_transaction(self.conn())
            .await
            .map_err(|cause| {
                warn!(error = %cause, "rollback failed; connection will be discarded");
                map_store_error(cause)
            })
    }
}
