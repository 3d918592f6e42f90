//! Shared helpers for backend integration tests.
//!
//! Integration tests compile as separate crates under `backend/tests/`. This
//! module wires the real in-process adapters (memory store, memory cache,
//! job queue and worker, broadcast event bus) around the domain services so
//! tests observe the same post-commit behaviour the server does.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use learning_platform::domain::ports::{
    EnrollRequest, EnrollmentNotifier, InstructorNotice, NotifierError, PaymentDetails,
    WelcomeNotice,
};
use learning_platform::domain::{
    CacheTtls, Course, CourseDraft, CourseId, CourseModule, CourseOutline, CourseQueryService,
    CourseStatus, Currency, EffectDispatcher, EnrollmentId, EnrollmentJobService,
    EnrollmentOptions, EnrollmentService, EnrollmentServiceConfig, EnrollmentServicePorts, Lesson,
    LessonId, Money, ModuleId, NoCouponDiscount, PaymentMethod, RetryPolicy, RetryRuntime,
    StudentDraft, UnlockPlan,
};
use learning_platform::outbound::cache::MemoryCourseCache;
use learning_platform::outbound::events::{BroadcastEventBus, InstructorNotificationListener};
use learning_platform::outbound::memory::MemoryEnrollmentStore;
use learning_platform::outbound::payment::SimulatedPaymentGateway;
use learning_platform::outbound::queue::{InProcessJobQueue, JobWorker};
use mockable::DefaultClock;
use serde_json::json;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub const COURSE_ID: i64 = 7;
pub const PRICE_CENTS: i64 = 15_000;

/// Notifier remembering every notice it was asked to deliver.
#[derive(Default)]
pub struct RecordingNotifier {
    welcomes: Mutex<Vec<WelcomeNotice>>,
    instructors: Mutex<Vec<InstructorNotice>>,
}

impl RecordingNotifier {
    pub fn welcomes(&self) -> Vec<WelcomeNotice> {
        self.welcomes.lock().expect("notifier mutex").clone()
    }

    pub fn instructors(&self) -> Vec<InstructorNotice> {
        self.instructors.lock().expect("notifier mutex").clone()
    }
}

#[async_trait]
impl EnrollmentNotifier for RecordingNotifier {
    async fn send_welcome(&self, notice: &WelcomeNotice) -> Result<(), NotifierError> {
        self.welcomes.lock().expect("notifier mutex").push(notice.clone());
        Ok(())
    }

    async fn notify_instructor(&self, notice: &InstructorNotice) -> Result<(), NotifierError> {
        self.instructors
            .lock()
            .expect("notifier mutex")
            .push(notice.clone());
        Ok(())
    }
}

/// Course with two modules of two lessons each (lesson ids 1 to 4).
pub fn course_with_slots(slots: u32) -> (Course, CourseOutline) {
    let course = Course::new(CourseDraft {
        id: CourseId::new(COURSE_ID),
        title: "Advanced Laravel Development".to_owned(),
        description: None,
        price: Money::from_cents(PRICE_CENTS).expect("price"),
        discount_price: None,
        currency: Currency::usd(),
        available_slots: slots,
        max_students: slots,
        enrolled_count: 0,
        status: CourseStatus::Published,
        instructor_email: Some("instructor@example.com".to_owned()),
    })
    .expect("valid course");
    let module = |id: i64, position: i32, lessons: [i64; 2]| CourseModule {
        id: ModuleId::new(id),
        title: format!("Module {id}"),
        position,
        lessons: lessons
            .into_iter()
            .zip(1..)
            .map(|(lesson, lesson_position)| Lesson {
                id: LessonId::new(lesson),
                title: format!("Lesson {lesson}"),
                position: lesson_position,
            })
            .collect(),
    };
    let outline = CourseOutline::new(vec![module(1, 1, [1, 2]), module(2, 2, [3, 4])]);
    (course, outline)
}

/// Enrollment request paying the full course price.
pub fn enroll_request(email: &str) -> EnrollRequest {
    EnrollRequest {
        student: StudentDraft {
            email: email.to_owned(),
            first_name: "Ada".to_owned(),
            last_name: "Lovelace".to_owned(),
            phone: None,
            preferences: None,
        },
        course_id: CourseId::new(COURSE_ID),
        payment: PaymentDetails {
            amount: Money::from_cents(PRICE_CENTS).expect("amount"),
            currency: Currency::usd(),
            method: PaymentMethod::CreditCard,
            coupon_code: None,
        },
        options: EnrollmentOptions::default(),
        unlock_plan: UnlockPlan::new(Vec::new()),
        metadata: json!({}),
    }
}

/// JSON body accepted by `POST /api/v1/enrollments`.
pub fn enroll_body(email: &str, amount: f64) -> serde_json::Value {
    json!({
        "student": {"email": email, "first_name": "Ada", "last_name": "Lovelace"},
        "course": {"id": COURSE_ID},
        "payment": {"amount": amount, "currency": "USD", "method": "credit_card"},
        "enrollment": {
            "start_immediately": true,
            "modules": [{"module_id": 1, "lessons": [{"lesson_id": 1}, {"lesson_id": 2}]}]
        },
        "metadata": {}
    })
}

/// Domain services over real in-process adapters with running background
/// tasks.
pub struct Stack {
    pub store: Arc<MemoryEnrollmentStore>,
    pub cache: Arc<MemoryCourseCache>,
    pub notifier: Arc<RecordingNotifier>,
    pub gateway: Arc<SimulatedPaymentGateway>,
    pub enrollments: EnrollmentService,
    pub courses: CourseQueryService,
    tasks: Vec<JoinHandle<()>>,
}

impl Stack {
    pub fn with_slots(slots: u32) -> Self {
        let store = Arc::new(MemoryEnrollmentStore::new());
        let (course, outline) = course_with_slots(slots);
        store.seed_course(course, outline).expect("seed course");
        let cache = Arc::new(MemoryCourseCache::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let gateway = Arc::new(SimulatedPaymentGateway::new());
        let clock = Arc::new(DefaultClock);

        let (queue, jobs) = InProcessJobQueue::new(64);
        let events = BroadcastEventBus::new(64);
        let listener = InstructorNotificationListener::new(events.subscribe(), notifier.clone());
        let effects = EffectDispatcher::new(cache.clone(), Arc::new(queue), Arc::new(events));

        let enrollments = EnrollmentService::new(
            EnrollmentServicePorts {
                store: store.clone(),
                gateway: gateway.clone(),
                discount: Arc::new(NoCouponDiscount),
                effects,
            },
            clock.clone(),
            EnrollmentServiceConfig {
                retry: RetryPolicy::with_max_attempts(5),
                ..EnrollmentServiceConfig::default()
            },
        );
        let courses = CourseQueryService::new(store.clone(), cache.clone(), CacheTtls::default());
        let handler = Arc::new(EnrollmentJobService::new(
            store.clone(),
            notifier.clone(),
            clock.clone(),
        ));
        let worker = JobWorker::new(
            jobs,
            handler,
            RetryPolicy::default(),
            RetryRuntime::default(),
            clock,
        );

        Self {
            store,
            cache,
            notifier,
            gateway,
            enrollments,
            courses,
            tasks: vec![tokio::spawn(worker.run()), tokio::spawn(listener.run())],
        }
    }

    /// Committed `(available_slots, enrolled_count)` for the test course.
    pub fn seats(&self) -> (u32, u32) {
        let course = self
            .store
            .course(CourseId::new(COURSE_ID))
            .expect("store readable")
            .expect("course exists");
        (course.available_slots(), course.enrolled_count())
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Identifier parsed from a JSON response field.
pub fn enrollment_id(raw: &serde_json::Value) -> EnrollmentId {
    let raw = raw.as_str().expect("enrollment id string");
    EnrollmentId::from_uuid(Uuid::parse_str(raw).expect("enrollment id uuid"))
}
