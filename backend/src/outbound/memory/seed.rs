//! Demo catalogue loaded into the memory store in development mode.

use crate::domain::{
    Course, CourseDraft, CourseId, CourseModule, CourseOutline, CourseStatus, CourseValidationError,
    Currency, Lesson, LessonId, Money, ModuleId, MoneyValidationError,
};

/// Demo data failed domain validation.
#[derive(Debug, thiserror::Error)]
pub enum DemoCatalogueError {
    #[error(transparent)]
    Price(#[from] MoneyValidationError),
    #[error(transparent)]
    Course(#[from] CourseValidationError),
}

struct DemoCourse {
    id: i64,
    title: &'static str,
    price_cents: i64,
    discount_cents: Option<i64>,
    slots: u32,
    status: CourseStatus,
    modules: &'static [(&'static str, &'static [&'static str])],
}

const DEMO_COURSES: &[DemoCourse] = &[
    DemoCourse {
        id: 1,
        title: "Advanced Laravel Development",
        price_cents: 15_000,
        discount_cents: None,
        slots: 30,
        status: CourseStatus::Published,
        modules: &[
            ("Foundations", &["Service container", "Routing"]),
            ("Persistence", &["Query builder", "Transactions and locking"]),
        ],
    },
    DemoCourse {
        id: 2,
        title: "Rust for Backend Engineers",
        price_cents: 24_900,
        discount_cents: Some(19_900),
        slots: 1,
        status: CourseStatus::Published,
        modules: &[("Ownership", &["Borrowing", "Lifetimes"])],
    },
    DemoCourse {
        id: 3,
        title: "Distributed Systems Primer",
        price_cents: 9_900,
        discount_cents: None,
        slots: 20,
        status: CourseStatus::Draft,
        modules: &[],
    },
];

/// Courses and outlines with module and lesson ids assigned sequentially.
pub fn demo_catalogue() -> Result<Vec<(Course, CourseOutline)>, DemoCatalogueError> {
    let mut next_module = 1;
    let mut next_lesson = 1;
    DEMO_COURSES
        .iter()
        .map(|demo| -> Result<(Course, CourseOutline), DemoCatalogueError> {
            let modules = demo
                .modules
                .iter()
                .zip(1..)
                .map(|((title, lessons), position)| {
                    let module = CourseModule {
                        id: ModuleId::new(next_module),
                        title: (*title).to_owned(),
                        position,
                        lessons: lessons
                            .iter()
                            .zip(1..)
                            .map(|(lesson, lesson_position)| {
                                let id = LessonId::new(next_lesson);
                                next_lesson += 1;
                                Lesson {
                                    id,
                                    title: (*lesson).to_owned(),
                                    position: lesson_position,
                                }
                            })
                            .collect(),
                    };
                    next_module += 1;
                    module
                })
                .collect();
            let course = Course::new(CourseDraft {
                id: CourseId::new(demo.id),
                title: demo.title.to_owned(),
                description: None,
                price: Money::from_cents(demo.price_cents)?,
                discount_price: demo.discount_cents.map(Money::from_cents).transpose()?,
                currency: Currency::usd(),
                available_slots: demo.slots,
                max_students: demo.slots,
                enrolled_count: 0,
                status: demo.status,
                instructor_email: Some("instructor@example.com".to_owned()),
            })?;
            Ok((course, CourseOutline::new(modules)))
        })
        .collect()
}
