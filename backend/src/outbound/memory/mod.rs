//! In-process store used in development mode and tests.
//!
//! Tables live behind a `std::sync::Mutex`. Course and enrollment row locks
//! are per-row `tokio::sync::Mutex` guards held by the transaction until it
//! ends, so concurrent enrollments for one course serialise exactly as they
//! do on `SELECT ... FOR UPDATE`. Writes are staged on the transaction and
//! applied atomically at commit after the unique constraints are re-checked.

mod seed;
mod store;
mod tables;

pub use seed::{DemoCatalogueError, demo_catalogue};
pub use store::{MemoryEnrollmentStore, MemoryTableCounts};
