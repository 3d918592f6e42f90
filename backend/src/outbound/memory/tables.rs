//! Row storage shared by committed state and transaction overlays.

use std::collections::{BTreeMap, HashMap};

use crate::domain::{
    Course, CourseId, CourseOutline, Enrollment, EnrollmentId, LessonId, LessonProgress, Payment,
    Student, StudentId,
};

#[derive(Debug, Default, Clone)]
pub(super) struct Tables {
    pub(super) students: HashMap<StudentId, Student>,
    pub(super) courses: BTreeMap<CourseId, Course>,
    pub(super) outlines: HashMap<CourseId, CourseOutline>,
    pub(super) enrollments: HashMap<EnrollmentId, Enrollment>,
    pub(super) payments: HashMap<EnrollmentId, Payment>,
    pub(super) progress: BTreeMap<(EnrollmentId, LessonId), LessonProgress>,
}

impl Tables {
    pub(super) fn student_by_email(&self, email: &str) -> Option<&Student> {
        self.students
            .values()
            .find(|student| student.email().as_ref() == email)
    }

    pub(super) fn enrollment_for(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Option<&Enrollment> {
        self.enrollments
            .values()
            .find(|e| e.student_id() == student_id && e.course_id() == course_id)
    }

    pub(super) fn progress_for(&self, enrollment_id: EnrollmentId) -> Vec<LessonProgress> {
        self.progress
            .range((enrollment_id, LessonId::new(i64::MIN))..=(enrollment_id, LessonId::new(i64::MAX)))
            .map(|(_, row)| row.clone())
            .collect()
    }
}
