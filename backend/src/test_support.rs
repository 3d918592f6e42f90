//! Test utilities for the backend crate.
//!
//! Shared by unit tests in `src/` and integration tests in `tests/`: a
//! settable clock and a recorder standing in for the cache, job queue and
//! event bus so tests can assert what was released after commit.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, Utc};
use mockable::Clock;

use crate::domain::ports::{
    CacheKey, CourseCache, CourseCacheError, EnrollmentEventPublisher, EventPublishError,
    JobQueue, JobQueueError, QueuedJob,
};
use crate::domain::{EffectDispatcher, EnrollmentEvent, EnrollmentJob};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(_) => panic!("test support mutex poisoned"),
    }
}

/// Clock whose time only moves when told to.
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn advance(&self, delta: Duration) {
        let delta = match TimeDelta::from_std(delta) {
            Ok(delta) => delta,
            Err(error) => {
                panic!("failed to convert Duration to TimeDelta: {error}; delta={delta:?}")
            }
        };
        *lock(&self.0) += delta;
    }

    pub fn advance_days(&self, days: i64) {
        *lock(&self.0) += TimeDelta::days(days);
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *lock(&self.0)
    }
}

/// Effect observed by [`RecordingEffects`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedEffect {
    Invalidated(Vec<String>),
    Enqueued(EnrollmentJob),
    Published(EnrollmentEvent),
}

/// Cache, queue and event bus that only record what they receive.
///
/// Cache reads always miss.
#[derive(Default)]
pub struct RecordingEffects {
    log: Mutex<Vec<RecordedEffect>>,
}

impl RecordingEffects {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Dispatcher releasing into this recorder.
    pub fn dispatcher(self: &Arc<Self>) -> EffectDispatcher {
        EffectDispatcher::new(self.clone(), self.clone(), self.clone())
    }

    pub fn recorded(&self) -> Vec<RecordedEffect> {
        lock(&self.log).clone()
    }

    pub fn jobs(&self) -> Vec<EnrollmentJob> {
        lock(&self.log)
            .iter()
            .filter_map(|effect| match effect {
                RecordedEffect::Enqueued(job) => Some(*job),
                _ => None,
            })
            .collect()
    }

    pub fn events(&self) -> Vec<EnrollmentEvent> {
        lock(&self.log)
            .iter()
            .filter_map(|effect| match effect {
                RecordedEffect::Published(event) => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    fn push(&self, effect: RecordedEffect) {
        lock(&self.log).push(effect);
    }
}

#[async_trait]
impl CourseCache for RecordingEffects {
    async fn get(&self, _key: &CacheKey) -> Result<Option<String>, CourseCacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &CacheKey, _value: &str, _ttl: Duration) -> Result<(), CourseCacheError> {
        Ok(())
    }

    async fn delete(&self, keys: &[CacheKey]) -> Result<(), CourseCacheError> {
        self.push(RecordedEffect::Invalidated(
            keys.iter().map(|key| key.as_str().to_owned()).collect(),
        ));
        Ok(())
    }
}

#[async_trait]
impl JobQueue for RecordingEffects {
    async fn enqueue(&self, queued: QueuedJob) -> Result<(), JobQueueError> {
        self.push(RecordedEffect::Enqueued(queued.job));
        Ok(())
    }
}

#[async_trait]
impl EnrollmentEventPublisher for RecordingEffects {
    async fn publish(&self, event: EnrollmentEvent) -> Result<(), EventPublishError> {
        self.push(RecordedEffect::Published(event));
        Ok(())
    }
}
