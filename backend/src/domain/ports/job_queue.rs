//! Ports for post-commit job dispatch and execution.

use async_trait::async_trait;

use crate::domain::{EnrollmentJob, Error, TraceId};

use super::define_port_error;

define_port_error! {
    /// Errors raised when handing jobs to the queue.
    pub enum JobQueueError {
        /// Queue backend is unavailable or shut down.
        Unavailable { message: String } => "job queue unavailable: {message}",
        /// Queue refused the job, for example because it is full.
        Rejected { message: String } => "job rejected: {message}",
    }
}

/// Job plus the trace identifier of the request that scheduled it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuedJob {
    pub job: EnrollmentJob,
    pub trace_id: TraceId,
}

impl QueuedJob {
    /// Capture the trace identifier currently in scope.
    pub fn capture(job: EnrollmentJob) -> Self {
        Self {
            job,
            trace_id: TraceId::current_or_generate(),
        }
    }
}

/// Hands jobs to background workers. Only called after commit.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: QueuedJob) -> Result<(), JobQueueError>;
}

/// Executes one job; errors make the worker retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &EnrollmentJob) -> Result<(), Error>;
}
