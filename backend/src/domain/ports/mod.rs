//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod cache_key;
mod course_cache;
mod course_catalogue_repository;
mod course_query;
mod enrollment_command;
mod enrollment_events;
mod enrollment_notifier;
mod enrollment_store;
mod job_queue;
mod payment_gateway;

pub use cache_key::{CacheKey, CacheKeyValidationError};
#[cfg(test)]
pub use course_cache::MockCourseCache;
pub use course_cache::{CourseCache, CourseCacheError};
#[cfg(test)]
pub use course_catalogue_repository::MockCourseCatalogueRepository;
pub use course_catalogue_repository::{
    CourseCatalogueError, CourseCatalogueRepository, CoursePage, CourseSearch, MAX_PER_PAGE,
};
#[cfg(test)]
pub use course_query::MockCourseQuery;
pub use course_query::{
    CourseAvailability, CourseDetails, CourseListing, CourseQuery, CourseSearchPage, LessonView,
    ModuleView,
};
#[cfg(test)]
pub use enrollment_command::MockEnrollmentCommand;
pub use enrollment_command::{
    CancellationReceipt, CourseSeats, EnrollRequest, EnrollmentCommand, EnrollmentReceipt,
    LessonCompletion, PaymentDetails, PaymentSummary,
};
#[cfg(test)]
pub use enrollment_events::MockEnrollmentEventPublisher;
pub use enrollment_events::{EnrollmentEventPublisher, EventPublishError};
#[cfg(test)]
pub use enrollment_notifier::MockEnrollmentNotifier;
pub use enrollment_notifier::{EnrollmentNotifier, InstructorNotice, NotifierError, WelcomeNotice};
#[cfg(test)]
pub use enrollment_store::MockEnrollmentStore;
pub use enrollment_store::{
    EnrollmentDetail, EnrollmentStore, EnrollmentStoreError, EnrollmentTransaction, UniqueTarget,
};
#[cfg(test)]
pub use job_queue::{MockJobHandler, MockJobQueue};
pub use job_queue::{JobHandler, JobQueue, JobQueueError, QueuedJob};
#[cfg(test)]
pub use payment_gateway::MockPaymentGateway;
pub use payment_gateway::{ChargeReceipt, ChargeRequest, PaymentGateway, PaymentGatewayError};
