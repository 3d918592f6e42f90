//! Worker loop executing queued enrollment jobs with bounded retries.

use std::sync::Arc;

use mockable::Clock;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, warn};

use crate::domain::ports::{JobHandler, QueuedJob};
use crate::domain::{Error, ErrorCode, RetryPolicy, RetryRuntime, TraceId};

use super::JobReceiver;

/// Drains a [`JobReceiver`] until every sender is dropped.
///
/// Each job runs on its own task, so a job waiting out a retry backoff does
/// not hold up the jobs queued behind it.
pub struct JobWorker {
    receiver: JobReceiver,
    executor: Arc<JobExecutor>,
}

/// Handler plus the retry settings applied to every job.
struct JobExecutor {
    handler: Arc<dyn JobHandler>,
    policy: RetryPolicy,
    runtime: RetryRuntime,
    clock: Arc<dyn Clock>,
}

/// Failures a later attempt might not hit.
fn is_retryable(error: &Error) -> bool {
    matches!(
        error.code(),
        ErrorCode::ServiceUnavailable
            | ErrorCode::TransactionRetryExhausted
            | ErrorCode::InternalError
    )
}

fn log_join_failure(joined: Result<(), JoinError>) {
    if let Err(cause) = joined {
        error!(error = %cause, "job task panicked");
    }
}

impl JobWorker {
    pub fn new(
        receiver: JobReceiver,
        handler: Arc<dyn JobHandler>,
        policy: RetryPolicy,
        runtime: RetryRuntime,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            receiver,
            executor: Arc::new(JobExecutor {
                handler,
                policy,
                runtime,
                clock,
            }),
        }
    }

    /// Spawn a task per received job. Returns once the queue is closed and
    /// every in-flight job has finished.
    pub async fn run(self) {
        info!("job worker started");
        let Self {
            mut receiver,
            executor,
        } = self;
        let mut in_flight = JoinSet::new();
        loop {
            tokio::select! {
                received = receiver.recv() => {
                    let Some(queued) = received else { break };
                    let executor = executor.clone();
                    in_flight.spawn(async move {
                        // Failures are logged inside; the worker keeps draining.
                        let _ = TraceId::scope(queued.trace_id, executor.process(queued)).await;
                    });
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    log_join_failure(joined);
                }
            }
        }
        while let Some(joined) = in_flight.join_next().await {
            log_join_failure(joined);
        }
        info!("job worker stopped");
    }

    /// Run one job inline, retrying failures the handler may recover from.
    pub async fn process(&self, queued: QueuedJob) -> Result<(), Error> {
        self.executor.process(queued).await
    }
}

impl JobExecutor {
    async fn process(&self, queued: QueuedJob) -> Result<(), Error> {
        let job = queued.job;
        let attempts = self.policy.attempts();
        let mut attempt = 1;
        loop {
            match self.handler.handle(&job).await {
                Ok(()) => {
                    info!(%job, attempt, trace_id = %queued.trace_id, "job completed");
                    return Ok(());
                }
                Err(cause) if is_retryable(&cause) && attempt < attempts => {
                    let delay = self.runtime.jitter.jittered_delay(
                        self.policy.base_delay(attempt),
                        attempt,
                        self.clock.utc(),
                    );
                    warn!(
                        %job,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %cause,
                        "job failed; retrying"
                    );
                    self.runtime.sleeper.sleep(delay).await;
                    attempt += 1;
                }
                Err(cause) => {
                    error!(
                        %job,
                        attempt,
                        code = cause.code().as_str(),
                        error = %cause,
                        trace_id = %queued.trace_id,
                        "job abandoned"
                    );
                    return Err(cause);
                }
            }
        }
    }
}
