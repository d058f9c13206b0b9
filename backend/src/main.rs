//! Backend entry-point: wires correlation middleware, request logging and
//! the health endpoints.

use actix_web::{web, App, HttpServer};
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};

use backend::api::health::{health, ready, HealthState};
use backend::config::AppConfig;
use backend::logging::{LogLevel, Logger};
use backend::{Correlation, RequestLog};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let config = AppConfig::from_env();
    let logger = Logger::new(LogLevel::from_env());

    let health_state = web::Data::new(HealthState::new(
        &config.app_name,
        &config.release_version,
        config.ready_min_uptime_seconds,
    ));
    let logger_data = web::Data::new(logger.clone());
    let bind_addr = config.bind_addr;

    HttpServer::new(move || {
        App::new()
            .app_data(health_state.clone())
            .app_data(logger_data.clone())
            .wrap(RequestLog::new(logger.clone()))
            .wrap(Correlation::new(logger.clone()))
            .service(health)
            .service(ready)
    })
    .bind(bind_addr)?
    .run()
    .await
}
