//! Memory-backed enrollment store and course catalogue.

use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OwnedMutexGuard;

use super::tables::Tables;
use crate::domain::ports::{
    CourseCatalogueError, CourseCatalogueRepository, CoursePage, CourseSearch, EnrollmentDetail,
    EnrollmentStore, EnrollmentStoreError, EnrollmentTransaction, UniqueTarget,
};
use crate::domain::{
    Course, CourseId, CourseOutline, EmailAddress, Enrollment, EnrollmentId, LessonProgress,
    Payment, Student, StudentId,
};

type RowLock = Arc<tokio::sync::Mutex<()>>;

/// Row counts used by tests and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryTableCounts {
    pub students: usize,
    pub enrollments: usize,
    pub payments: usize,
    pub lesson_progress: usize,
}

struct Shared {
    tables: Mutex<Tables>,
    course_locks: Mutex<HashMap<CourseId, RowLock>>,
    enrollment_locks: Mutex<HashMap<EnrollmentId, RowLock>>,
    commit_faults: Mutex<VecDeque<EnrollmentStoreError>>,
}

/// In-process [`EnrollmentStore`] and [`CourseCatalogueRepository`].
#[derive(Clone)]
pub struct MemoryEnrollmentStore {
    shared: Arc<Shared>,
}

impl Default for MemoryEnrollmentStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> EnrollmentStoreError {
    EnrollmentStoreError::query("memory store mutex poisoned")
}

fn row_lock<K: Eq + Hash + Copy>(
    locks: &Mutex<HashMap<K, RowLock>>,
    key: K,
) -> Result<RowLock, EnrollmentStoreError> {
    let mut map = locks.lock().map_err(|_| poisoned())?;
    Ok(map.entry(key).or_default().clone())
}

/// Drop entries for `keys` that no other transaction holds or waits on.
/// Clones are only taken under the map mutex, so a count of one means the
/// map owns the last reference.
fn prune_row_locks<K: Eq + Hash>(locks: &Mutex<HashMap<K, RowLock>>, keys: &HashSet<K>) {
    let Ok(mut map) = locks.lock() else {
        return;
    };
    for key in keys {
        if map.get(key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            map.remove(key);
        }
    }
}

impl MemoryEnrollmentStore {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: Mutex::new(Tables::default()),
                course_locks: Mutex::new(HashMap::new()),
                enrollment_locks: Mutex::new(HashMap::new()),
                commit_faults: Mutex::new(VecDeque::new()),
            }),
        }
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, EnrollmentStoreError> {
        self.shared.tables.lock().map_err(|_| poisoned())
    }

    /// Insert or replace a catalogue course and its outline.
    pub fn seed_course(
        &self,
        course: Course,
        outline: CourseOutline,
    ) -> Result<(), EnrollmentStoreError> {
        let mut tables = self.tables()?;
        tables.outlines.insert(course.id(), outline);
        tables.courses.insert(course.id(), course);
        Ok(())
    }

    /// Committed course row.
    pub fn course(&self, id: CourseId) -> Result<Option<Course>, EnrollmentStoreError> {
        Ok(self.tables()?.courses.get(&id).cloned())
    }

    /// Committed lesson progress rows for an enrollment.
    pub fn lesson_progress(
        &self,
        enrollment_id: EnrollmentId,
    ) -> Result<Vec<LessonProgress>, EnrollmentStoreError> {
        Ok(self.tables()?.progress_for(enrollment_id))
    }

    /// Fail the next commit with `error` instead of applying it. Queued
    /// faults are consumed one per commit.
    pub fn fail_next_commit(&self, error: EnrollmentStoreError) -> Result<(), EnrollmentStoreError> {
        self.shared
            .commit_faults
            .lock()
            .map_err(|_| poisoned())?
            .push_back(error);
        Ok(())
    }

    #[cfg(test)]
    fn row_lock_entries(&self) -> (usize, usize) {
        let courses = self.shared.course_locks.lock().map_or(0, |map| map.len());
        let enrollments = self.shared.enrollment_locks.lock().map_or(0, |map| map.len());
        (courses, enrollments)
    }

    pub fn counts(&self) -> Result<MemoryTableCounts, EnrollmentStoreError> {
        let tables = self.tables()?;
        Ok(MemoryTableCounts {
            students: tables.students.len(),
            enrollments: tables.enrollments.len(),
            payments: tables.payments.len(),
            lesson_progress: tables.progress.len(),
        })
    }
}

#[async_trait]
impl EnrollmentStore for MemoryEnrollmentStore {
    async fn begin(&self) -> Result<Box<dyn EnrollmentTransaction>, EnrollmentStoreError> {
        Ok(Box::new(MemoryTransaction {
            shared: self.shared.clone(),
            staged: Tables::default(),
            new_students: HashSet::new(),
            new_enrollments: HashSet::new(),
            guards: Vec::new(),
            locked_courses: HashSet::new(),
            locked_enrollments: HashSet::new(),
        }))
    }

    async fn find_course(&self, id: CourseId) -> Result<Option<Course>, EnrollmentStoreError> {
        self.course(id)
    }

    async fn course_outline(&self, id: CourseId) -> Result<CourseOutline, EnrollmentStoreError> {
        Ok(self.tables()?.outlines.get(&id).cloned().unwrap_or_default())
    }

    async fn find_enrollment_detail(
        &self,
        id: EnrollmentId,
    ) -> Result<Option<EnrollmentDetail>, EnrollmentStoreError> {
        let tables = self.tables()?;
        let Some(enrollment) = tables.enrollments.get(&id).cloned() else {
            return Ok(None);
        };
        let student = tables
            .students
            .get(&enrollment.student_id())
            .cloned()
            .ok_or_else(|| EnrollmentStoreError::query("enrollment references a missing student"))?;
        let course = tables
            .courses
            .get(&enrollment.course_id())
            .cloned()
            .ok_or_else(|| EnrollmentStoreError::query("enrollment references a missing course"))?;
        Ok(Some(EnrollmentDetail {
            payment: tables.payments.get(&id).cloned(),
            progress: tables.progress_for(id),
            enrollment,
            student,
            course,
        }))
    }

    async fn overdue_enrollments(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<EnrollmentId>, EnrollmentStoreError> {
        let tables = self.tables()?;
        let mut ids: Vec<EnrollmentId> = tables
            .enrollments
            .values()
            .filter(|e| e.is_overdue(now))
            .map(Enrollment::id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn ping(&self) -> Result<(), EnrollmentStoreError> {
        self.tables().map(|_| ())
    }
}

fn catalogue_error(error: EnrollmentStoreError) -> CourseCatalogueError {
    CourseCatalogueError::query(error.to_string())
}

#[async_trait]
impl CourseCatalogueRepository for MemoryEnrollmentStore {
    async fn find_course(&self, id: CourseId) -> Result<Option<Course>, CourseCatalogueError> {
        self.course(id).map_err(catalogue_error)
    }

    async fn course_outline(&self, id: CourseId) -> Result<CourseOutline, CourseCatalogueError> {
        EnrollmentStore::course_outline(self, id)
            .await
            .map_err(catalogue_error)
    }

    async fn search(&self, search: &CourseSearch) -> Result<CoursePage, CourseCatalogueError> {
        let tables = self.tables().map_err(catalogue_error)?;
        let needle = search.query.to_lowercase();
        let matching: Vec<&Course> = tables
            .courses
            .values()
            .filter(|c| c.status() == search.status)
            .filter(|c| needle.is_empty() || c.title().to_lowercase().contains(&needle))
            .collect();
        let total = matching.len() as u64;
        let courses = matching
            .into_iter()
            .skip(usize::try_from(search.offset()).unwrap_or(usize::MAX))
            .take(search.per_page as usize)
            .cloned()
            .collect();
        Ok(CoursePage { courses, total })
    }
}

struct MemoryTransaction {
    shared: Arc<Shared>,
    staged: Tables,
    new_students: HashSet<StudentId>,
    new_enrollments: HashSet<EnrollmentId>,
    guards: Vec<OwnedMutexGuard<()>>,
    locked_courses: HashSet<CourseId>,
    locked_enrollments: HashSet<EnrollmentId>,
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        self.guards.clear();
        prune_row_locks(&self.shared.course_locks, &self.locked_courses);
        prune_row_locks(&self.shared.enrollment_locks, &self.locked_enrollments);
    }
}

impl MemoryTransaction {
    fn committed(&self) -> Result<MutexGuard<'_, Tables>, EnrollmentStoreError> {
        self.shared.tables.lock().map_err(|_| poisoned())
    }

    fn course_row(&self, id: CourseId) -> Result<Option<Course>, EnrollmentStoreError> {
        if let Some(course) = self.staged.courses.get(&id) {
            return Ok(Some(course.clone()));
        }
        Ok(self.committed()?.courses.get(&id).cloned())
    }

    fn enrollment_row(&self, id: EnrollmentId) -> Result<Option<Enrollment>, EnrollmentStoreError> {
        if let Some(enrollment) = self.staged.enrollments.get(&id) {
            return Ok(Some(enrollment.clone()));
        }
        Ok(self.committed()?.enrollments.get(&id).cloned())
    }

    fn payment_row(&self, id: EnrollmentId) -> Result<Option<Payment>, EnrollmentStoreError> {
        if let Some(payment) = self.staged.payments.get(&id) {
            return Ok(Some(payment.clone()));
        }
        Ok(self.committed()?.payments.get(&id).cloned())
    }

    /// Verify unique constraints against committed rows and apply staged rows.
    fn apply(&mut self) -> Result<(), EnrollmentStoreError> {
        let mut tables = self.shared.tables.lock().map_err(|_| poisoned())?;
        for id in &self.new_students {
            let Some(student) = self.staged.students.get(id) else {
                continue;
            };
            if tables.students.contains_key(id)
                || tables.student_by_email(student.email().as_ref()).is_some()
            {
                return Err(EnrollmentStoreError::conflict(UniqueTarget::StudentEmail));
            }
        }
        for id in &self.new_enrollments {
            let Some(enrollment) = self.staged.enrollments.get(id) else {
                continue;
            };
            if tables
                .enrollment_for(enrollment.student_id(), enrollment.course_id())
                .is_some()
            {
                return Err(EnrollmentStoreError::conflict(UniqueTarget::StudentCourse));
            }
        }
        if self
            .staged
            .payments
            .keys()
            .any(|id| !self.staged.enrollments.contains_key(id) && !tables.enrollments.contains_key(id))
        {
            return Err(EnrollmentStoreError::query(
                "payment references a missing enrollment",
            ));
        }

        let staged = std::mem::take(&mut self.staged);
        tables.students.extend(staged.students);
        tables.courses.extend(staged.courses);
        tables.enrollments.extend(staged.enrollments);
        tables.payments.extend(staged.payments);
        tables.progress.extend(staged.progress);
        Ok(())
    }
}

#[async_trait]
impl EnrollmentTransaction for MemoryTransaction {
    async fn find_student_by_email(
        &mut self,
        email: &EmailAddress,
    ) -> Result<Option<Student>, EnrollmentStoreError> {
        if let Some(student) = self.staged.student_by_email(email.as_ref()) {
            return Ok(Some(student.clone()));
        }
        Ok(self.committed()?.student_by_email(email.as_ref()).cloned())
    }

    async fn insert_student(&mut self, student: &Student) -> Result<(), EnrollmentStoreError> {
        let taken = self.staged.student_by_email(student.email().as_ref()).is_some()
            || self
                .committed()?
                .student_by_email(student.email().as_ref())
                .is_some();
        if taken {
            return Err(EnrollmentStoreError::conflict(UniqueTarget::StudentEmail));
        }
        self.new_students.insert(student.id());
        self.staged.students.insert(student.id(), student.clone());
        Ok(())
    }

    async fn lock_course(&mut self, id: CourseId) -> Result<Option<Course>, EnrollmentStoreError> {
        if self.locked_courses.insert(id) {
            let lock = row_lock(&self.shared.course_locks, id)?;
            self.guards.push(lock.lock_owned().await);
        }
        self.course_row(id)
    }

    async fn update_course_seats(&mut self, course: &Course) -> Result<(), EnrollmentStoreError> {
        if !self.locked_courses.contains(&course.id()) {
            return Err(EnrollmentStoreError::query(
                "course seats updated without holding the row lock",
            ));
        }
        if self.course_row(course.id())?.is_none() {
            return Err(EnrollmentStoreError::query("course row not found"));
        }
        self.staged.courses.insert(course.id(), course.clone());
        Ok(())
    }

    async fn has_enrollment(
        &mut self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<bool, EnrollmentStoreError> {
        if self.staged.enrollment_for(student_id, course_id).is_some() {
            return Ok(true);
        }
        Ok(self
            .committed()?
            .enrollment_for(student_id, course_id)
            .is_some())
    }

    async fn find_enrollment(
        &mut self,
        id: EnrollmentId,
    ) -> Result<Option<Enrollment>, EnrollmentStoreError> {
        self.enrollment_row(id)
    }

    async fn lock_enrollment(
        &mut self,
        id: EnrollmentId,
    ) -> Result<Option<Enrollment>, EnrollmentStoreError> {
        if self.locked_enrollments.insert(id) {
            let lock = row_lock(&self.shared.enrollment_locks, id)?;
            self.guards.push(lock.lock_owned().await);
        }
        self.enrollment_row(id)
    }

    async fn insert_enrollment(
        &mut self,
        enrollment: &Enrollment,
    ) -> Result<(), EnrollmentStoreError> {
        let (student_id, course_id) = (enrollment.student_id(), enrollment.course_id());
        if self.has_enrollment(student_id, course_id).await? {
            return Err(EnrollmentStoreError::conflict(UniqueTarget::StudentCourse));
        }
        self.new_enrollments.insert(enrollment.id());
        self.staged
            .enrollments
            .insert(enrollment.id(), enrollment.clone());
        Ok(())
    }

    async fn update_enrollment(
        &mut self,
        enrollment: &Enrollment,
    ) -> Result<(), EnrollmentStoreError> {
        if self.enrollment_row(enrollment.id())?.is_none() {
            return Err(EnrollmentStoreError::query("enrollment row not found"));
        }
        self.staged
            .enrollments
            .insert(enrollment.id(), enrollment.clone());
        Ok(())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), EnrollmentStoreError> {
        if self.payment_row(payment.enrollment_id)?.is_some() {
            return Err(EnrollmentStoreError::conflict(UniqueTarget::Other));
        }
        self.staged
            .payments
            .insert(payment.enrollment_id, payment.clone());
        Ok(())
    }

    async fn update_payment(&mut self, payment: &Payment) -> Result<(), EnrollmentStoreError> {
        if self.payment_row(payment.enrollment_id)?.is_none() {
            return Err(EnrollmentStoreError::query("payment row not found"));
        }
        self.staged
            .payments
            .insert(payment.enrollment_id, payment.clone());
        Ok(())
    }

    async fn find_payment(
        &mut self,
        enrollment_id: EnrollmentId,
    ) -> Result<Option<Payment>, EnrollmentStoreError> {
        self.payment_row(enrollment_id)
    }

    async fn insert_lesson_progress(
        &mut self,
        rows: &[LessonProgress],
    ) -> Result<(), EnrollmentStoreError> {
        for row in rows {
            let key = (row.enrollment_id, row.lesson_id);
            let exists = self.staged.progress.contains_key(&key)
                || self.committed()?.progress.contains_key(&key);
            if exists {
                return Err(EnrollmentStoreError::conflict(UniqueTarget::LessonProgress));
            }
            self.staged.progress.insert(key, row.clone());
        }
        Ok(())
    }

    async fn lesson_progress(
        &mut self,
        enrollment_id: EnrollmentId,
    ) -> Result<Vec<LessonProgress>, EnrollmentStoreError> {
        let mut rows: HashMap<_, _> = self
            .committed()?
            .progress_for(enrollment_id)
            .into_iter()
            .map(|row| (row.lesson_id, row))
            .collect();
        for row in self.staged.progress_for(enrollment_id) {
            rows.insert(row.lesson_id, row);
        }
        let mut rows: Vec<_> = rows.into_values().collect();
        rows.sort_by_key(|row| row.lesson_id);
        Ok(rows)
    }

    async fn update_lesson_progress(
        &mut self,
        row: &LessonProgress,
    ) -> Result<(), EnrollmentStoreError> {
        let key = (row.enrollment_id, row.lesson_id);
        let exists = self.staged.progress.contains_key(&key)
            || self.committed()?.progress.contains_key(&key);
        if !exists {
            return Err(EnrollmentStoreError::query("lesson progress row not found"));
        }
        self.staged.progress.insert(key, row.clone());
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), EnrollmentStoreError> {
        let fault = self
            .shared
            .commit_faults
            .lock()
            .map_err(|_| poisoned())?
            .pop_front();
        match fault {
            Some(error) => Err(error),
            None => self.apply(),
        }
    }

    async fn rollback(self: Box<Self>) -> Result<(), EnrollmentStoreError> {
        Ok(())
    }
}
