//! Fan-out of enrollment events over `tokio::sync::broadcast`.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use crate::domain::EnrollmentEvent;
use crate::domain::ports::{EnrollmentEventPublisher, EventPublishError};

/// [`EnrollmentEventPublisher`] delivering to every live subscriber.
///
/// Publishing with no subscribers succeeds; events are out-of-band and no
/// listener is required for an enrollment to complete.
#[derive(Debug, Clone)]
pub struct BroadcastEventBus {
    sender: broadcast::Sender<EnrollmentEvent>,
}

impl BroadcastEventBus {
    /// Bus retaining up to `capacity` undelivered events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EnrollmentEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl EnrollmentEventPublisher for BroadcastEventBus {
    async fn publish(&self, event: EnrollmentEvent) -> Result<(), EventPublishError> {
        let name = event.name();
        let enrollment_id = event.enrollment_id();
        match self.sender.send(event) {
            Ok(receivers) => debug!(event = name, %enrollment_id, receivers, "event published"),
            Err(_) => debug!(event = name, %enrollment_id, "event published without subscribers"),
        }
        Ok(())
    }
}
