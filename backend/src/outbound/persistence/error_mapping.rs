//! Diesel error mapping for the enrollment store and course catalogue.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use super::models::RowDecodeError;
use super::pool::PoolError;
use crate::domain::ports::{CourseCatalogueError, EnrollmentStoreError, UniqueTarget};

/// PostgreSQL reports deadlocks (40P01) and lock timeouts (55P03) without a
/// dedicated Diesel error kind; recognise them by message.
fn is_lock_failure(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("deadlock detected")
        || lower.contains("lock timeout")
        || lower.contains("could not obtain lock")
}

fn log_failure(error: &DieselError) {
    match error {
        DieselError::DatabaseError(kind, info) => {
            debug!(
                ?kind,
                message = info.message(),
                constraint = info.constraint_name(),
                "diesel operation failed"
            );
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(error),
            "diesel operation failed"
        ),
    }
}

pub(crate) fn map_store_pool_error(error: PoolError) -> EnrollmentStoreError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            EnrollmentStoreError::connection(message)
        }
    }
}

/// Map Diesel failures raised inside an enrollment transaction.
pub(crate) fn map_store_error(error: DieselError) -> EnrollmentStoreError {
    log_failure(&error);
    match error {
        DieselError::DatabaseError(kind, info) => match kind {
            DatabaseErrorKind::UniqueViolation => EnrollmentStoreError::conflict(
                info.constraint_name()
                    .map_or(UniqueTarget::Other, UniqueTarget::from_constraint),
            ),
            DatabaseErrorKind::SerializationFailure => {
                EnrollmentStoreError::transient("serialization failure")
            }
            DatabaseErrorKind::ClosedConnection => {
                EnrollmentStoreError::connection("database connection error")
            }
            _ if is_lock_failure(info.message()) => {
                EnrollmentStoreError::transient(info.message().to_owned())
            }
            _ => EnrollmentStoreError::query("database error"),
        },
        DieselError::NotFound => EnrollmentStoreError::query("record not found"),
        DieselError::QueryBuilderError(_) => EnrollmentStoreError::query("database query error"),
        DieselError::BrokenTransactionManager => {
            EnrollmentStoreError::connection("transaction manager is broken")
        }
        _ => EnrollmentStoreError::query("database error"),
    }
}

pub(crate) fn map_store_decode_error(error: RowDecodeError) -> EnrollmentStoreError {
    EnrollmentStoreError::query(error.to_string())
}

pub(crate) fn map_catalogue_pool_error(error: PoolError) -> CourseCatalogueError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            CourseCatalogueError::connection(message)
        }
    }
}

pub(crate) fn map_catalogue_error(error: DieselError) -> CourseCatalogueError {
    log_failure(&error);
    match error {
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            CourseCatalogueError::connection("database connection error")
        }
        DieselError::QueryBuilderError(_) => CourseCatalogueError::query("database query error"),
        _ => CourseCatalogueError::query("database error"),
    }
}

pub(crate) fn map_catalogue_decode_error(error: RowDecodeError) -> CourseCatalogueError {
    CourseCatalogueError::query(error.to_string())
}

#[cfg(test)]
mod tests {
    use diesel::result::DatabaseErrorInformation;
    use rstest::rstest;

    use super::*;

    /// Error payload carrying a constraint name, as PostgreSQL reports it.
    struct ConstraintInfo {
        message: &'static str,
        constraint: Option<&'static str>,
    }

    impl DatabaseErrorInformation for ConstraintInfo {
        fn message(&self) -> &str {
            self.message
        }

        fn details(&self) -> Option<&str> {
            None
        }

        fn hint(&self) -> Option<&str> {
            None
        }

        fn table_name(&self) -> Option<&str> {
            None
        }

        fn column_name(&self) -> Option<&str> {
            None
        }

        fn constraint_name(&self) -> Option<&str> {
            self.constraint
        }

        fn statement_position(&self) -> Option<i32> {
            None
        }
    }

    fn database_error(
        kind: DatabaseErrorKind,
        message: &'static str,
        constraint: Option<&'static str>,
    ) -> DieselError {
        DieselError::DatabaseError(kind, Box::new(ConstraintInfo { message, constraint }))
    }

    #[rstest]
    #[case("students_email_key", UniqueTarget::StudentEmail)]
    #[case("enrollments_student_id_course_id_key", UniqueTarget::StudentCourse)]
    #[case("payments_enrollment_id_key", UniqueTarget::Other)]
    fn unique_violations_name_their_target(#[case] constraint: &'static str, #[case] target: UniqueTarget) {
        let error = map_store_error(database_error(
            DatabaseErrorKind::UniqueViolation,
            "duplicate key value violates unique constraint",
            Some(constraint),
        ));
        assert_eq!(error, EnrollmentStoreError::conflict(target));
    }

    #[rstest]
    #[case(DatabaseErrorKind::SerializationFailure, "could not serialize access")]
    #[case(DatabaseErrorKind::Unknown, "deadlock detected")]
    #[case(DatabaseErrorKind::Unknown, "canceling statement due to lock timeout")]
    fn lock_contention_is_transient(#[case] kind: DatabaseErrorKind, #[case] message: &'static str) {
        assert!(map_store_error(database_error(kind, message, None)).is_transient());
    }

    #[rstest]
    fn closed_connections_are_connection_errors() {
        let error = map_store_error(database_error(
            DatabaseErrorKind::ClosedConnection,
            "server closed the connection",
            None,
        ));
        assert!(matches!(error, EnrollmentStoreError::Connection { .. }));
    }

    #[rstest]
    fn other_failures_are_query_errors() {
        let error = map_store_error(DieselError::DatabaseError(
            DatabaseErrorKind::CheckViolation,
            Box::new("new row violates check constraint".to_owned()),
        ));
        assert!(matches!(error, EnrollmentStoreError::Query { .. }));
    }

    #[rstest]
    fn pool_failures_are_connection_errors() {
        assert!(matches!(
            map_store_pool_error(PoolError::checkout("timed out")),
            EnrollmentStoreError::Connection { .. }
        ));
        assert!(matches!(
            map_catalogue_pool_error(PoolError::checkout("timed out")),
            CourseCatalogueError::Connection { .. }
        ));
    }
}
