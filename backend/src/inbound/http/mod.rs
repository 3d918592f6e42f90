//! HTTP inbound adapter exposing REST endpoints.

pub mod courses;
pub mod enrollments;
pub mod envelope;
pub mod error;
pub mod health;
pub mod state;
pub mod validation;

pub use crate::domain::ApiResult;
