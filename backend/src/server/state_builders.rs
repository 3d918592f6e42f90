//! Builders wiring adapters into the domain services.
//!
//! PostgreSQL and Redis are used when their URLs are configured; otherwise
//! the in-memory store seeded with the demo catalogue and the in-process
//! cache stand in, which keeps local runs dependency free.

use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::{Context, Result};
use mockable::{Clock, DefaultClock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use learning_platform::domain::ports::{
    CourseCache, CourseCatalogueRepository, EnrollmentNotifier, EnrollmentStore,
};
use learning_platform::domain::{
    CourseQueryService, EffectDispatcher, EnrollmentJobService, EnrollmentService,
    EnrollmentServiceConfig, EnrollmentServicePorts, RetryRuntime, TraceId,
};
use learning_platform::inbound::http::state::{HttpState, HttpStatePorts};
use learning_platform::outbound::cache::{MemoryCourseCache, RedisCacheConfig, RedisCourseCache};
use learning_platform::outbound::events::{BroadcastEventBus, InstructorNotificationListener};
use learning_platform::outbound::memory::{MemoryEnrollmentStore, demo_catalogue};
use learning_platform::outbound::notifier::TracingNotifier;
use learning_platform::outbound::payment::SimulatedPaymentGateway;
use learning_platform::outbound::persistence::{
    DbPool, DieselCourseCatalogueRepository, DieselEnrollmentStore, PoolConfig,
    run_pending_migrations,
};
use learning_platform::outbound::queue::{InProcessJobQueue, JobWorker};

use super::AppSettings;

const JOB_QUEUE_CAPACITY: usize = 1_024;
const EVENT_BUS_CAPACITY: usize = 256;

/// Store and catalogue pair backing the services.
struct Persistence {
    store: Arc<dyn EnrollmentStore>,
    catalogue: Arc<dyn CourseCatalogueRepository>,
}

/// Fully wired application graph.
pub struct AppRuntime {
    pub http_state: HttpState,
    pub store: Arc<dyn EnrollmentStore>,
    /// Worker, listener and sweep tasks; aborted on shutdown.
    pub background: Vec<JoinHandle<()>>,
}

async fn build_persistence(settings: &AppSettings) -> Result<Persistence> {
    let Some(url) = settings.database_url.as_deref() else {
        let store = MemoryEnrollmentStore::new();
        let catalogue = demo_catalogue().wrap_err("build demo catalogue")?;
        let courses = catalogue.len();
        for (course, outline) in catalogue {
            store
                .seed_course(course, outline)
                .wrap_err("seed demo catalogue")?;
        }
        warn!(courses, "no database configured; using the in-memory store");
        let store = Arc::new(store);
        return Ok(Persistence {
            store: store.clone(),
            catalogue: store,
        });
    };

    if settings.run_migrations {
        let applied = run_pending_migrations(url)
            .await
            .wrap_err("apply database migrations")?;
        info!(applied, "database migrations applied");
    }

    let pool = DbPool::new(PoolConfig::new(url).with_max_size(settings.db_max_connections()))
        .await
        .wrap_err("connect to PostgreSQL")?;
    Ok(Persistence {
        store: Arc::new(DieselEnrollmentStore::new(pool.clone())),
        catalogue: Arc::new(DieselCourseCatalogueRepository::new(pool)),
    })
}

async fn build_cache(settings: &AppSettings) -> Result<Arc<dyn CourseCache>> {
    match settings.redis_url.as_deref() {
        Some(url) => {
            let cache = RedisCourseCache::connect(RedisCacheConfig::new(url))
                .await
                .wrap_err("connect to Redis")?;
            Ok(Arc::new(cache))
        }
        None => {
            warn!("no Redis configured; using the in-process course cache");
            Ok(Arc::new(MemoryCourseCache::new()))
        }
    }
}

fn spawn_expiry_sweep(service: EnrollmentService, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match TraceId::scope(TraceId::generate(), service.expire_overdue()).await {
                Ok(0) => {}
                Ok(expired) => info!(expired, "expired overdue enrollments"),
                Err(err) => error!(error = %err, "expiry sweep failed"),
            }
        }
    })
}

/// Build every adapter and service, and start the background tasks.
///
/// # Errors
/// Returns an error when configuration is invalid or a configured backing
/// service cannot be reached.
pub async fn build_runtime(settings: &AppSettings) -> Result<AppRuntime> {
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let persistence = build_persistence(settings).await?;
    let cache = build_cache(settings).await?;
    let discount = settings
        .discount_policy()
        .wrap_err("parse coupon table")?;
    let student_policy = settings
        .student_policy()
        .wrap_err("parse student policy")?;
    let retry = settings.retry_policy();

    let (queue, jobs) = InProcessJobQueue::new(JOB_QUEUE_CAPACITY);
    let events = BroadcastEventBus::new(EVENT_BUS_CAPACITY);
    let instructor_events = events.subscribe();
    let effects = EffectDispatcher::new(cache.clone(), Arc::new(queue), Arc::new(events));

    let enrollments = EnrollmentService::new(
        EnrollmentServicePorts {
            store: persistence.store.clone(),
            gateway: Arc::new(SimulatedPaymentGateway::new()),
            discount,
            effects,
        },
        clock.clone(),
        EnrollmentServiceConfig {
            retry,
            student_policy,
        },
    );
    let courses = CourseQueryService::new(persistence.catalogue, cache, settings.cache_ttls());

    let notifier: Arc<dyn EnrollmentNotifier> = Arc::new(TracingNotifier);
    let job_handler = Arc::new(EnrollmentJobService::new(
        persistence.store.clone(),
        notifier.clone(),
        clock.clone(),
    ));
    let worker = JobWorker::new(jobs, job_handler, retry, RetryRuntime::default(), clock);
    let listener = InstructorNotificationListener::new(instructor_events, notifier);

    let mut background = vec![tokio::spawn(worker.run()), tokio::spawn(listener.run())];
    match settings.expiry_sweep_interval() {
        Some(every) => background.push(spawn_expiry_sweep(enrollments.clone(), every)),
        None => info!("expiry sweep disabled"),
    }

    Ok(AppRuntime {
        http_state: HttpState::new(HttpStatePorts {
            enrollments: Arc::new(enrollments),
            courses: Arc::new(courses),
        }),
        store: persistence.store,
        background,
    })
}
