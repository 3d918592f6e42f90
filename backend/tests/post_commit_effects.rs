//! Effects released after commit: cache invalidation, background jobs and
//! the instructor notification listener, all over real in-process adapters.

use learning_platform::domain::ports::{CourseQuery, EnrollmentCommand, EnrollmentStore};
use learning_platform::domain::{CourseId, EnrollmentStatus, ErrorCode};
use rstest::rstest;

mod support;

use support::{COURSE_ID, Stack, enroll_request, eventually};

#[rstest]
#[tokio::test]
async fn availability_reflects_the_commit_once_enroll_returns() {
    let stack = Stack::with_slots(3);
    let course_id = CourseId::new(COURSE_ID);

    let before = stack.courses.availability(course_id).await.expect("read");
    assert_eq!(before.available_slots, 3);
    assert!(!stack.cache.is_empty().expect("cache readable"));

    stack
        .enrollments
        .enroll(enroll_request("ada@example.com"))
        .await
        .expect("enrolled");

    let after = stack.courses.availability(course_id).await.expect("read");
    assert_eq!(after.available_slots, 2);
    assert_eq!(after.enrolled_count, 1);
}

#[rstest]
#[tokio::test]
async fn failed_enrollment_keeps_the_cached_read_model() {
    let stack = Stack::with_slots(1);
    let course_id = CourseId::new(COURSE_ID);
    stack
        .enrollments
        .enroll(enroll_request("ada@example.com"))
        .await
        .expect("enrolled");
    stack.courses.availability(course_id).await.expect("prime");
    let cached = stack.cache.len().expect("cache readable");

    let error = stack
        .enrollments
        .enroll(enroll_request("grace@example.com"))
        .await
        .expect_err("course is full");

    assert_eq!(error.code(), ErrorCode::CourseFull);
    assert_eq!(stack.cache.len().expect("cache readable"), cached);
}

#[rstest]
#[tokio::test]
async fn jobs_observe_the_committed_enrollment() {
    let stack = Stack::with_slots(3);

    let receipt = stack
        .enrollments
        .enroll(enroll_request("ada@example.com"))
        .await
        .expect("enrolled");
    assert_eq!(receipt.status, EnrollmentStatus::Pending);

    assert!(
        eventually(|| stack.notifier.welcomes().len() == 1).await,
        "welcome notification should be delivered"
    );
    let welcome = &stack.notifier.welcomes()[0];
    assert_eq!(welcome.enrollment_id, receipt.enrollment_id);
    assert_eq!(welcome.student.email, "ada@example.com");

    let mut active = false;
    for _ in 0..200 {
        let detail = stack
            .store
            .find_enrollment_detail(receipt.enrollment_id)
            .await
            .expect("store readable")
            .expect("enrollment exists");
        if detail.enrollment.status() == EnrollmentStatus::Active {
            active = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(active, "course access job should activate the enrollment");
}

#[rstest]
#[case::notify(true, 1)]
#[case::silent(false, 0)]
#[tokio::test]
async fn instructor_is_told_only_when_requested(#[case] notify: bool, #[case] expected: usize) {
    let stack = Stack::with_slots(3);
    let mut request = enroll_request("ada@example.com");
    request.options.notify_instructor = notify;
    request.options.send_welcome_email = false;

    stack.enrollments.enroll(request).await.expect("enrolled");

    assert!(
        eventually(|| stack.notifier.instructors().len() == expected).await,
        "instructor notices should settle at {expected}"
    );
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(stack.notifier.instructors().len(), expected);
    assert!(stack.notifier.welcomes().is_empty());
    if let Some(notice) = stack.notifier.instructors().first() {
        assert_eq!(notice.instructor_email, "instructor@example.com");
    }
}

#[rstest]
#[tokio::test]
async fn expiry_sweep_leaves_current_enrollments_alone() {
    let stack = Stack::with_slots(3);
    let mut request = enroll_request("ada@example.com");
    request.options.start_immediately = true;
    stack.enrollments.enroll(request).await.expect("enrolled");

    assert_eq!(stack.enrollments.expire_overdue().await.expect("sweep"), 0);
}
