//! Health endpoints: identity and readiness probes for orchestration.
//!
//! Both probes log an event correlated with the inbound request id.
//! Readiness compares process uptime against a configurable threshold so
//! load balancers do not route to a cold process.

use std::time::{Duration, Instant};

use actix_web::{get, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::request_context::should_use_secure_cookies;
use crate::logging::{LogEvent, Logger};
use crate::middleware::correlation::header_str;
use crate::X_REQUEST_ID_HEADER;

/// Identity and uptime state shared by the health handlers.
pub struct HealthState {
    app: String,
    release: String,
    started: Instant,
    ready_min_uptime: Duration,
}

impl HealthState {
    /// Capture the process start time and identity.
    #[must_use]
    pub fn new(app: impl Into<String>, release: impl Into<String>, ready_min_uptime_seconds: u64) -> Self {
        Self {
            app: app.into(),
            release: release.into(),
            started: Instant::now(),
            ready_min_uptime: Duration::from_secs(ready_min_uptime_seconds),
        }
    }

    /// Seconds since the process started serving.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Whether the process has been up long enough to take traffic.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.uptime() >= self.ready_min_uptime
    }

    fn payload(&self, status: &str) -> HealthPayload {
        HealthPayload {
            status: status.to_owned(),
            app: self.app.clone(),
            release: self.release.clone(),
        }
    }
}

/// JSON payload returned by both probes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthPayload {
    /// `ok`, `ready` or `starting`.
    #[schema(example = "ok")]
    pub status: String,
    /// Application name.
    pub app: String,
    /// Release version identifier.
    pub release: String,
}

/// Liveness and identity probe.
#[utoipa::path(
    get,
    path = "/api/health",
    tags = ["health"],
    responses(
        (status = 200, description = "Service identity", body = HealthPayload)
    )
)]
#[get("/api/health")]
pub async fn health(
    state: web::Data<HealthState>,
    logger: web::Data<Logger>,
    req: HttpRequest,
) -> HttpResponse {
    let mut event = LogEvent::new("health_check")
        .path(req.path())
        .with("secureCookies", should_use_secure_cookies(&req));
    if let Some(request_id) = header_str(req.headers(), X_REQUEST_ID_HEADER) {
        event = event.request_id(request_id);
    }
    logger.info(event);

    HttpResponse::Ok().json(state.payload("ok"))
}

/// Readiness probe. Returns 503 until the uptime threshold passes.
#[utoipa::path(
    get,
    path = "/api/ready",
    tags = ["health"],
    responses(
        (status = 200, description = "Server is ready to handle traffic", body = HealthPayload),
        (status = 503, description = "Server is still starting", body = HealthPayload)
    )
)]
#[get("/api/ready")]
pub async fn ready(
    state: web::Data<HealthState>,
    logger: web::Data<Logger>,
    req: HttpRequest,
) -> HttpResponse {
    let is_ready = state.is_ready();

    let mut event = LogEvent::new("readiness_check")
        .path(req.path())
        .with("secureCookies", should_use_secure_cookies(&req))
        .with("uptimeSeconds", state.uptime().as_secs())
        .with(
            "readinessThresholdSeconds",
            state.ready_min_uptime.as_secs(),
        )
        .with("isReady", is_ready);
    if let Some(request_id) = header_str(req.headers(), X_REQUEST_ID_HEADER) {
        event = event.request_id(request_id);
    }
    logger.info(event);

    if is_ready {
        HttpResponse::Ok().json(state.payload("ready"))
    } else {
        HttpResponse::ServiceUnavailable().json(state.payload("starting"))
    }
}
