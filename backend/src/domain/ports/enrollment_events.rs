//! Port for publishing enrollment domain events.

use async_trait::async_trait;

use crate::domain::EnrollmentEvent;

use super::define_port_error;

define_port_error! {
    /// Errors raised by event publishers.
    pub enum EventPublishError {
        /// No listener could accept the event.
        Unavailable { message: String } => "event bus unavailable: {message}",
    }
}

/// Publishes events to out-of-band listeners. Only called after commit.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EnrollmentEventPublisher: Send + Sync {
    async fn publish(&self, event: EnrollmentEvent) -> Result<(), EventPublishError>;
}
