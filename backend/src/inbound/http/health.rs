//! Health endpoints: liveness and readiness checks for orchestration and load balancers.
//! Document endpoints in OpenAPI via Utoipa.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use actix_web::{HttpResponse, get, http::header, web};
use tracing::warn;

use crate::domain::ports::EnrollmentStore;

/// Shared health state for readiness and liveness checks.
///
/// Readiness additionally requires the enrollment store to answer a ping.
pub struct HealthState {
    ready: AtomicBool,
    live: AtomicBool,
    store: Arc<dyn EnrollmentStore>,
}

impl HealthState {
    /// Create a new health state starting as not ready but live.
    pub fn new(store: Arc<dyn EnrollmentStore>) -> Self {
        Self {
            ready: AtomicBool::new(false),
            live: AtomicBool::new(true),
            store,
        }
    }

    /// Mark the service as ready.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Flag the service as unhealthy so liveness checks fail fast during shutdown.
    pub fn mark_unhealthy(&self) {
        self.live.store(false, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn is_alive(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    async fn store_reachable(&self) -> bool {
        match self.store.ping().await {
            Ok(()) => true,
            Err(error) => {
                warn!(%error, "readiness check could not reach the enrollment store");
                false
            }
        }
    }

    fn check_response(healthy: bool) -> HttpResponse {
        let mut response = if healthy {
            HttpResponse::Ok()
        } else {
            HttpResponse::ServiceUnavailable()
        };

        response
            .insert_header((header::CACHE_CONTROL, "no-store"))
            .finish()
    }
}

/// Readiness check. Return 200 when the server has started and the store
/// answers; return 503 otherwise.
#[utoipa::path(
    get,
    path = "/health/ready",
    tags = ["health"],
    responses(
        (status = 200, description = "Server is ready to handle traffic"),
        (status = 503, description = "Server or enrollment store is not ready")
    )
)]
#[get("/health/ready")]
pub async fn ready(state: web::Data<HealthState>) -> HttpResponse {
    let ok = state.is_ready() && state.store_reachable().await;
    HealthState::check_response(ok)
}

/// Liveness check. Return 200 while the process is marked alive and 503 once draining.
#[utoipa::path(
    get,
    path = "/health/live",
    tags = ["health"],
    responses(
        (status = 200, description = "Server is alive"),
        (status = 503, description = "Server is shutting down")
    )
)]
#[get("/health/live")]
pub async fn live(state: web::Data<HealthState>) -> HttpResponse {
    HealthState::check_response(state.is_alive())
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::{App, test as actix_test};
    use rstest::rstest;

    use super::*;
    use crate::domain::ports::{EnrollmentStoreError, MockEnrollmentStore};

    fn store(ping_ok: bool) -> Arc<dyn EnrollmentStore> {
        let mut store = MockEnrollmentStore::new();
        store.expect_ping().returning(move || {
            if ping_ok {
                Ok(())
            } else {
                Err(EnrollmentStoreError::connection("refused"))
            }
        });
        Arc::new(store)
    }

    async fn request_health(state: HealthState, uri: &str) -> (StatusCode, Option<String>) {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .service(ready)
                .service(live),
        )
        .await;
        let response =
            actix_test::call_service(&app, actix_test::TestRequest::get().uri(uri).to_request())
                .await;
        let cache_control = response
            .headers()
            .get(header::CACHE_CONTROL)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        (response.status(), cache_control)
    }

    #[rstest]
    #[case::not_started(false, true, StatusCode::SERVICE_UNAVAILABLE)]
    #[case::store_down(true, false, StatusCode::SERVICE_UNAVAILABLE)]
    #[case::ready(true, true, StatusCode::OK)]
    #[actix_web::test]
    async fn readiness_requires_startup_and_store(
        #[case] started: bool,
        #[case] ping_ok: bool,
        #[case] expected: StatusCode,
    ) {
        let state = HealthState::new(store(ping_ok));
        if started {
            state.mark_ready();
        }

        let (status, cache_control) = request_health(state, "/health/ready").await;

        assert_eq!(status, expected);
        assert_eq!(cache_control.as_deref(), Some("no-store"));
    }

    #[actix_web::test]
    async fn liveness_fails_once_draining() {
        let state = HealthState::new(store(true));
        state.mark_unhealthy();

        let (status, _) = request_health(state, "/health/live").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
