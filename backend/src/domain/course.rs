//! Course catalogue entities and seat accounting.
//!
//! A course owns its seat counters. Seats only move through
//! [`Course::reserve_seat`] and [`Course::release_seat`], which the
//! enrollment services call while holding the course row lock.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{Currency, Money};

macro_rules! catalogue_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a database identifier.
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Raw identifier.
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

catalogue_id!(
    /// Course identifier.
    CourseId
);
catalogue_id!(
    /// Course module identifier.
    ModuleId
);
catalogue_id!(
    /// Lesson identifier.
    LessonId
);

/// Publication status of a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CourseStatus {
    Draft,
    Published,
    Archived,
}

impl CourseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status `{0}`")]
pub struct UnknownStatus(pub String);

impl FromStr for CourseStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            "archived" => Ok(Self::Archived),
            other => Err(UnknownStatus(other.to_owned())),
        }
    }
}

/// Validation failures for course construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CourseValidationError {
    #[error("course title must not be empty")]
    EmptyTitle,
    #[error("available slots ({available}) must not exceed max students ({max})")]
    SlotsExceedCapacity { available: u32, max: u32 },
    #[error("discount price must not exceed the base price")]
    DiscountAboveBase,
}

/// Reasons a course cannot take a new enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SeatError {
    #[error("course is not published")]
    NotPublished,
    #[error("course has no available seats")]
    Full,
}

/// Input for [`Course::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct CourseDraft {
    pub id: CourseId,
    pub title: String,
    pub description: Option<String>,
    pub price: Money,
    pub discount_price: Option<Money>,
    pub currency: Currency,
    pub available_slots: u32,
    pub max_students: u32,
    pub enrolled_count: u32,
    pub status: CourseStatus,
    pub instructor_email: Option<String>,
}

/// Course aggregate with pricing and capacity.
///
/// ## Invariants
/// - `available_slots <= max_students`.
/// - `discount_price`, when present, is at most `price`.
#[derive(Debug, Clone, PartialEq)]
pub struct Course {
    id: CourseId,
    title: String,
    description: Option<String>,
    price: Money,
    discount_price: Option<Money>,
    currency: Currency,
    available_slots: u32,
    max_students: u32,
    enrolled_count: u32,
    status: CourseStatus,
    instructor_email: Option<String>,
}

impl Course {
    pub fn new(draft: CourseDraft) -> Result<Self, CourseValidationError> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(CourseValidationError::EmptyTitle);
        }
        if draft.available_slots > draft.max_students {
            return Err(CourseValidationError::SlotsExceedCapacity {
                available: draft.available_slots,
                max: draft.max_students,
            });
        }
        if draft.discount_price.is_some_and(|d| d > draft.price) {
            return Err(CourseValidationError::DiscountAboveBase);
        }
        Ok(Self {
            id: draft.id,
            title: title.to_owned(),
            description: draft.description,
            price: draft.price,
            discount_price: draft.discount_price,
            currency: draft.currency,
            available_slots: draft.available_slots,
            max_students: draft.max_students,
            enrolled_count: draft.enrolled_count,
            status: draft.status,
            instructor_email: draft.instructor_email,
        })
    }

    pub fn id(&self) -> CourseId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn discount_price(&self) -> Option<Money> {
        self.discount_price
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn available_slots(&self) -> u32 {
        self.available_slots
    }

    pub fn max_students(&self) -> u32 {
        self.max_students
    }

    pub fn enrolled_count(&self) -> u32 {
        self.enrolled_count
    }

    pub fn status(&self) -> CourseStatus {
        self.status
    }

    pub fn instructor_email(&self) -> Option<&str> {
        self.instructor_email.as_deref()
    }

    /// Price a student pays before coupons: the discount price when set.
    pub fn effective_price(&self) -> Money {
        self.discount_price.unwrap_or(self.price)
    }

    /// Whether the course currently accepts enrollments.
    pub fn is_open(&self) -> bool {
        self.status == CourseStatus::Published && self.available_slots > 0
    }

    /// Check status and capacity without mutating.
    pub fn check_enrollable(&self) -> Result<(), SeatError> {
        if self.status != CourseStatus::Published {
            return Err(SeatError::NotPublished);
        }
        if self.available_slots == 0 {
            return Err(SeatError::Full);
        }
        Ok(())
    }

    /// Take one seat.
    ///
    /// # Examples
    /// ```
    /// use learning_platform::domain::{Course, CourseDraft, CourseId, CourseStatus, Currency, Money};
    ///
    /// let mut course = Course::new(CourseDraft {
    ///     id: CourseId::new(1),
    ///     title: "Rust".into(),
    ///     description: None,
    ///     price: Money::from_cents(15_000).expect("price"),
    ///     discount_price: None,
    ///     currency: Currency::usd(),
    ///     available_slots: 1,
    ///     max_students: 1,
    ///     enrolled_count: 0,
    ///     status: CourseStatus::Published,
    ///     instructor_email: None,
    /// })
    /// .expect("valid course");
    /// course.reserve_seat().expect("seat free");
    /// assert_eq!(course.available_slots(), 0);
    /// assert!(course.reserve_seat().is_err());
    /// ```
    pub fn reserve_seat(&mut self) -> Result<(), SeatError> {
        self.check_enrollable()?;
        self.available_slots -= 1;
        self.enrolled_count = self.enrolled_count.saturating_add(1);
        Ok(())
    }

    /// Return one seat, never exceeding `max_students`.
    pub fn release_seat(&mut self) {
        self.available_slots = (self.available_slots + 1).min(self.max_students);
        self.enrolled_count = self.enrolled_count.saturating_sub(1);
    }
}

/// Lesson within a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: LessonId,
    pub title: String,
    pub position: i32,
}

/// Module with its ordered lessons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseModule {
    pub id: ModuleId,
    pub title: String,
    pub position: i32,
    pub lessons: Vec<Lesson>,
}

/// Ordered module/lesson tree of a course.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseOutline {
    modules: Vec<CourseModule>,
}

impl CourseOutline {
    /// Build an outline, ordering modules and lessons by position.
    pub fn new(mut modules: Vec<CourseModule>) -> Self {
        modules.sort_by_key(|m| (m.position, m.id));
        for module in &mut modules {
            module.lessons.sort_by_key(|l| (l.position, l.id));
        }
        Self { modules }
    }

    pub fn modules(&self) -> &[CourseModule] {
        &self.modules
    }

    /// Find a module by id.
    pub fn module(&self, id: ModuleId) -> Option<&CourseModule> {
        self.modules.iter().find(|m| m.id == id)
    }

    /// Whether `lesson` belongs to `module` in this outline.
    pub fn contains_lesson(&self, module: ModuleId, lesson: LessonId) -> bool {
        self.module(module)
            .is_some_and(|m| m.lessons.iter().any(|l| l.id == lesson))
    }

    pub fn lesson_count(&self) -> usize {
        self.modules.iter().map(|m| m.lessons.len()).sum()
    }
}


#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::fixtures::{published_course, two_lesson_outline};
    use super::*;

    #[rstest]
    fn effective_price_prefers_discount() {
        let base = published_course(1, 5);
        assert_eq!(base.effective_price().cents(), 15_000);

        let discounted = Course::new(CourseDraft {
            id: CourseId::new(2),
            title: "Discounted".to_owned(),
            description: None,
            price: Money::from_cents(15_000).expect("price"),
            discount_price: Some(Money::from_cents(9_900).expect("discount")),
            currency: Currency::usd(),
            available_slots: 1,
            max_students: 1,
            enrolled_count: 0,
            status: CourseStatus::Published,
            instructor_email: None,
        })
        .expect("valid course");
        assert_eq!(discounted.effective_price().cents(), 9_900);
    }

    #[rstest]
    fn reserve_then_release_restores_counters() {
        let mut course = published_course(1, 2);
        course.reserve_seat().expect("seat");
        assert_eq!((course.available_slots(), course.enrolled_count()), (1, 1));
        course.release_seat();
        assert_eq!((course.available_slots(), course.enrolled_count()), (2, 0));
        course.release_seat();
        assert_eq!(course.available_slots(), 2, "never above capacity");
    }

    #[rstest]
    fn full_course_rejects_reservation() {
        let mut course = published_course(1, 1);
        course.reserve_seat().expect("last seat");
        assert_eq!(course.reserve_seat(), Err(SeatError::Full));
        assert!(!course.is_open());
    }

    #[rstest]
    #[case(CourseStatus::Draft)]
    #[case(CourseStatus::Archived)]
    fn unpublished_course_rejects_reservation(#[case] status: CourseStatus) {
        let course = Course::new(CourseDraft {
            status,
            ..draft_from(&published_course(1, 3))
        })
        .expect("valid");
        assert_eq!(course.check_enrollable(), Err(SeatError::NotPublished));
    }

    #[rstest]
    fn slots_above_capacity_are_rejected() {
        let err = Course::new(CourseDraft {
            available_slots: 4,
            max_students: 3,
            ..draft_from(&published_course(1, 3))
        })
        .expect_err("invalid capacity");
        assert_eq!(
            err,
            CourseValidationError::SlotsExceedCapacity { available: 4, max: 3 }
        );
    }

    #[rstest]
    fn outline_orders_lessons_and_checks_membership() {
        let outline = two_lesson_outline();
        let lessons = &outline.modules()[0].lessons;
        assert_eq!(lessons[0].id, LessonId::new(1));
        assert!(outline.contains_lesson(ModuleId::new(1), LessonId::new(2)));
        assert!(!outline.contains_lesson(ModuleId::new(1), LessonId::new(9)));
        assert!(!outline.contains_lesson(ModuleId::new(7), LessonId::new(1)));
        assert_eq!(outline.lesson_count(), 2);
    }

    #[rstest]
    #[case("draft", CourseStatus::Draft)]
    #[case("published", CourseStatus::Published)]
    fn status_parses(#[case] raw: &str, #[case] expected: CourseStatus) {
        assert_eq!(raw.parse::<CourseStatus>(), Ok(expected));
    }

    fn draft_from(course: &Course) -> CourseDraft {
        CourseDraft {
            id: course.id(),
            title: course.title().to_owned(),
            description: None,
            price: course.price(),
            discount_price: course.discount_price(),
            currency: course.currency().clone(),
            available_slots: course.available_slots(),
            max_students: course.max_students(),
            enrolled_count: course.enrolled_count(),
            status: course.status(),
            instructor_email: None,
        }
    }
}
