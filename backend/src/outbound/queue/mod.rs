//! In-process job queue and the worker that drains it.
//!
//! Jobs reach the queue only after their transaction commits, so a worker
//! never observes uncommitted rows. Each job runs inside the trace scope of
//! the request that scheduled it.

mod in_process;
mod worker;

pub use self::in_process::{InProcessJobQueue, JobReceiver};
pub use self::worker::JobWorker;
