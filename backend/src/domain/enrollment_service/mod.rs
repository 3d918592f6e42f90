//! Enrollment orchestration.
//!
//! Every mutation runs inside a [`UnitOfWork`]: store writes plus an outbox
//! of cache invalidations, jobs and events. Transient store failures roll the
//! attempt back and retry with jittered exponential backoff. Outbox effects
//! are released only after a successful commit.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use mockable::Clock;
use serde_json::json;
use tracing::{error, warn};

use crate::domain::ports::{EnrollmentStore, PaymentGateway};
use crate::domain::{
    CommittedEffects, DiscountPolicy, EffectDispatcher, Error, RetryPolicy, RetryRuntime,
    UnitOfWork,
};

mod enroll;
mod lifecycle;
mod mapping;

use mapping::AttemptError;

/// How enrollment treats an email that already belongs to a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StudentPolicy {
    /// Register a new student per request; a known email is rejected.
    #[default]
    AlwaysCreate,
    /// Enroll the existing student with that email.
    ReuseExisting,
}

impl StudentPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AlwaysCreate => "always_create",
            Self::ReuseExisting => "reuse_existing",
        }
    }
}

impl fmt::Display for StudentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised student policy name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown student policy `{0}`; expected always_create or reuse_existing")]
pub struct UnknownStudentPolicy(pub String);

impl FromStr for StudentPolicy {
    type Err = UnknownStudentPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "always_create" => Ok(Self::AlwaysCreate),
            "reuse_existing" => Ok(Self::ReuseExisting),
            other => Err(UnknownStudentPolicy(other.to_owned())),
        }
    }
}

/// Tunables for [`EnrollmentService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnrollmentServiceConfig {
    pub retry: RetryPolicy,
    pub student_policy: StudentPolicy,
}

/// Port bundle required by the enrollment service.
pub struct EnrollmentServicePorts {
    pub store: Arc<dyn EnrollmentStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub discount: Arc<dyn DiscountPolicy>,
    pub effects: EffectDispatcher,
}

/// Enrollment orchestrator implementing [`crate::domain::ports::EnrollmentCommand`].
#[derive(Clone)]
pub struct EnrollmentService {
    store: Arc<dyn EnrollmentStore>,
    gateway: Arc<dyn PaymentGateway>,
    discount: Arc<dyn DiscountPolicy>,
    effects: EffectDispatcher,
    clock: Arc<dyn Clock>,
    runtime: RetryRuntime,
    config: EnrollmentServiceConfig,
}

impl EnrollmentService {
    /// Build a service that sleeps on the Tokio timer between retries.
    pub fn new(
        ports: EnrollmentServicePorts,
        clock: Arc<dyn Clock>,
        config: EnrollmentServiceConfig,
    ) -> Self {
        Self::with_runtime(ports, clock, RetryRuntime::default(), config)
    }

    pub fn with_runtime(
        ports: EnrollmentServicePorts,
        clock: Arc<dyn Clock>,
        runtime: RetryRuntime,
        config: EnrollmentServiceConfig,
    ) -> Self {
        Self {
            store: ports.store,
            gateway: ports.gateway,
            discount: ports.discount,
            effects: ports.effects,
            clock,
            runtime,
            config,
        }
    }

    pub fn config(&self) -> EnrollmentServiceConfig {
        self.config
    }

    /// Run `attempt` until it commits, fails permanently or exhausts the
    /// retry budget, then release the committed effects.
    async fn with_retry<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(T, CommittedEffects), AttemptError>>,
    {
        let max_attempts = self.config.retry.attempts();
        for number in 1..=max_attempts {
            match attempt().await {
                Ok((value, effects)) => {
                    self.effects.release(effects).await;
                    return Ok(value);
                }
                Err(AttemptError::Retryable(cause)) if number < max_attempts => {
                    let base = self.config.retry.base_delay(number);
                    let delay = self
                        .runtime
                        .jitter
                        .jittered_delay(base, number, self.clock.utc());
                    warn!(
                        operation,
                        attempt = number,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        %cause,
                        "transient store failure; retrying"
                    );
                    self.runtime.sleeper.sleep(delay).await;
                }
                Err(AttemptError::Retryable(cause)) => {
                    error!(operation, attempts = number, %cause, "retry budget exhausted");
                    return Err(Error::retry_exhausted(format!(
                        "{operation} could not complete after {number} attempts; try again later"
                    ))
                    .with_details(json!({ "attempts": number })));
                }
                Err(AttemptError::Fatal(error)) => return Err(error),
            }
        }
        Err(Error::internal("retry loop ended without an outcome"))
    }

    /// Commit on success, roll back on failure.
    async fn finish<T>(
        uow: UnitOfWork,
        outcome: Result<T, AttemptError>,
        policy: StudentPolicy,
    ) -> Result<(T, CommittedEffects), AttemptError> {
        match outcome {
            Ok(value) => {
                let effects = uow
                    .commit()
                    .await
                    .map_err(|cause| mapping::classify(cause, policy))?;
                Ok((value, effects))
            }
            Err(error) => {
                uow.rollback().await;
                Err(error)
            }
        }
    }
}
