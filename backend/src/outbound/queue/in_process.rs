//! Bounded `tokio::sync::mpsc` job queue.

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use crate::domain::ports::{JobQueue, JobQueueError, QueuedJob};

/// Receiving half handed to a [`super::JobWorker`].
pub type JobReceiver = mpsc::Receiver<QueuedJob>;

/// [`JobQueue`] backed by a bounded channel.
///
/// Enqueueing never waits: a full queue rejects the job so the request that
/// committed it is not held up by slow workers.
#[derive(Debug, Clone)]
pub struct InProcessJobQueue {
    sender: mpsc::Sender<QueuedJob>,
}

impl InProcessJobQueue {
    /// Create a queue holding at most `capacity` pending jobs.
    pub fn new(capacity: usize) -> (Self, JobReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl JobQueue for InProcessJobQueue {
    async fn enqueue(&self, queued: QueuedJob) -> Result<(), JobQueueError> {
        match self.sender.try_send(queued) {
            Ok(()) => {
                debug!(job = %queued.job, trace_id = %queued.trace_id, "job enqueued");
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(JobQueueError::rejected("job queue is full")),
            Err(TrySendError::Closed(_)) => {
                Err(JobQueueError::unavailable("job worker has shut down"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::domain::{EnrollmentId, EnrollmentJob, TraceId};

    fn queued() -> QueuedJob {
        QueuedJob {
            job: EnrollmentJob::SetupCourseAccess {
                enrollment_id: EnrollmentId::random(),
            },
            trace_id: TraceId::generate(),
        }
    }

    #[rstest]
    #[tokio::test]
    async fn jobs_arrive_in_order() {
        let (queue, mut receiver) = InProcessJobQueue::new(4);
        let first = queued();
        let second = queued();
        queue.enqueue(first).await.expect("first");
        queue.enqueue(second).await.expect("second");

        assert_eq!(receiver.recv().await, Some(first));
        assert_eq!(receiver.recv().await, Some(second));
    }

    #[rstest]
    #[tokio::test]
    async fn full_queue_rejects() {
        let (queue, _receiver) = InProcessJobQueue::new(1);
        queue.enqueue(queued()).await.expect("first fits");

        let error = queue.enqueue(queued()).await.expect_err("full");
        assert!(matches!(error, JobQueueError::Rejected { .. }));
    }

    #[rstest]
    #[tokio::test]
    async fn closed_queue_is_unavailable() {
        let (queue, receiver) = InProcessJobQueue::new(1);
        drop(receiver);

        let error = queue.enqueue(queued()).await.expect_err("closed");
        assert!(matches!(error, JobQueueError::Unavailable { .. }));
    }
}
