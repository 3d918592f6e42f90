//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **persistence**: PostgreSQL enrollment store and course catalogue (Diesel)
//! - **memory**: in-process store for development mode and tests
//! - **cache**: Redis and in-process course caches
//! - **queue**: bounded in-process job queue and its worker
//! - **events**: broadcast event bus and the instructor listener
//! - **payment**: simulated payment gateway
//! - **notifier**: log-backed notification channel
//!
//! Adapters translate between domain types and infrastructure
//! representations. They contain no business logic.

pub mod cache;
pub mod events;
pub mod memory;
pub mod notifier;
pub mod payment;
pub mod persistence;
pub mod queue;
