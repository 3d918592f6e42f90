//! Store transaction paired with a post-commit outbox.
//!
//! Services record cache invalidations, jobs and events on the outbox while
//! the transaction is open. [`UnitOfWork::commit`] is the only way to obtain
//! [`CommittedEffects`], and [`EffectDispatcher::release`] only accepts
//! committed effects, so nothing leaves the process before the writes are
//! visible. Rolling back or dropping the unit of work discards the outbox.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::ports::{
    CacheKey, CourseCache, EnrollmentEventPublisher, EnrollmentStore, EnrollmentStoreError,
    EnrollmentTransaction, JobQueue, QueuedJob,
};
use crate::domain::{EnrollmentEvent, EnrollmentJob};

/// Side effect released after commit.
#[derive(Debug, Clone, PartialEq)]
pub enum PostCommitEffect {
    InvalidateCache(Vec<CacheKey>),
    Dispatch(EnrollmentJob),
    Publish(EnrollmentEvent),
}

/// Effects recorded during a transaction.
#[derive(Debug, Default)]
pub struct Outbox {
    effects: Vec<PostCommitEffect>,
}

impl Outbox {
    pub fn invalidate(&mut self, keys: Vec<CacheKey>) {
        if !keys.is_empty() {
            self.effects.push(PostCommitEffect::InvalidateCache(keys));
        }
    }

    pub fn dispatch(&mut self, job: EnrollmentJob) {
        self.effects.push(PostCommitEffect::Dispatch(job));
    }

    pub fn publish(&mut self, event: EnrollmentEvent) {
        self.effects.push(PostCommitEffect::Publish(event));
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

/// Effects of a transaction that committed.
#[derive(Debug, Default, PartialEq)]
pub struct CommittedEffects(Vec<PostCommitEffect>);

impl CommittedEffects {
    pub fn effects(&self) -> &[PostCommitEffect] {
        &self.0
    }
}

/// Store transaction plus its outbox.
pub struct UnitOfWork {
    tx: Box<dyn EnrollmentTransaction>,
    outbox: Outbox,
}

impl UnitOfWork {
    pub async fn begin(store: &dyn EnrollmentStore) -> Result<Self, EnrollmentStoreError> {
        Ok(Self {
            tx: store.begin().await?,
            outbox: Outbox::default(),
        })
    }

    pub fn tx(&mut self) -> &mut dyn EnrollmentTransaction {
        self.tx.as_mut()
    }

    pub fn outbox(&mut self) -> &mut Outbox {
        &mut self.outbox
    }

    /// Commit the transaction and hand back its effects.
    pub async fn commit(self) -> Result<CommittedEffects, EnrollmentStoreError> {
        let Self { tx, outbox } = self;
        tx.commit().await?;
        Ok(CommittedEffects(outbox.effects))
    }

    /// Roll back; recorded effects are dropped.
    pub async fn rollback(self) {
        let discarded = self.outbox.len();
        if let Err(error) = self.tx.rollback().await {
            warn!(%error, "rollback failed; connection will be discarded");
        }
        if discarded > 0 {
            debug!(discarded, "dropped outbox effects of rolled back transaction");
        }
    }
}

/// Releases committed effects to the cache, queue and event bus.
///
/// Failures are logged and never reported to the caller: the enrollment is
/// already committed and the cache is advisory.
#[derive(Clone)]
pub struct EffectDispatcher {
    cache: Arc<dyn CourseCache>,
    queue: Arc<dyn JobQueue>,
    events: Arc<dyn EnrollmentEventPublisher>,
}

impl EffectDispatcher {
    pub fn new(
        cache: Arc<dyn CourseCache>,
        queue: Arc<dyn JobQueue>,
        events: Arc<dyn EnrollmentEventPublisher>,
    ) -> Self {
        Self {
            cache,
            queue,
            events,
        }
    }

    /// Release effects in recorded order.
    pub async fn release(&self, committed: CommittedEffects) {
        for effect in committed.0 {
            match effect {
                PostCommitEffect::InvalidateCache(keys) => {
                    if let Err(error) = self.cache.delete(&keys).await {
                        warn!(%error, keys = ?keys, "cache invalidation failed");
                    }
                }
                PostCommitEffect::Dispatch(job) => {
                    if let Err(error) = self.queue.enqueue(QueuedJob::capture(job)).await {
                        warn!(%error, %job, "job dispatch failed");
                    }
                }
                PostCommitEffect::Publish(event) => {
                    let name = event.name();
                    let enrollment_id = event.enrollment_id();
                    if let Err(error) = self.events.publish(event).await {
                        warn!(%error, event = name, %enrollment_id, "event publication failed");
                    }
                }
            }
        }
    }
}
