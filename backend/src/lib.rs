//! Learning platform enrollment backend.
//!
//! The crate is laid out hexagonally: [`domain`] holds entities, services and
//! port traits; [`inbound`] adapts HTTP requests onto the driving ports;
//! [`outbound`] implements the driven ports (PostgreSQL, Redis, in-memory
//! stand-ins, the job worker and the event bus).

pub mod doc;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
#[doc(hidden)]
pub mod test_support;

/// Public OpenAPI surface used by Swagger UI and tooling.
pub use doc::ApiDoc;
pub use middleware::Trace;
