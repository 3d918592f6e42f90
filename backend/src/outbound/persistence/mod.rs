//! PostgreSQL persistence adapters using Diesel.
//!
//! Row structs (`models.rs`) and table definitions (`schema.rs`) stay inside
//! this module; adapters translate them to domain aggregates through the
//! validating constructors. Connections come from a `bb8` pool of
//! `diesel-async` connections.
//!
//! # Example
//!
//! ```ignore
//! use learning_platform::outbound::persistence::{DbPool, DieselEnrollmentStore, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/learning")).await?;
//! let store = DieselEnrollmentStore::new(pool);
//! ```

mod diesel_course_catalogue_repository;
mod diesel_enrollment_store;
mod error_mapping;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_course_catalogue_repository::DieselCourseCatalogueRepository;
pub use diesel_enrollment_store::DieselEnrollmentStore;
pub use migrations::{MigrationError, run_pending_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
