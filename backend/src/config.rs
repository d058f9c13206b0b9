//! Application configuration read from the environment at bootstrap.

use std::net::SocketAddr;

const DEFAULT_READY_MIN_UPTIME_SECONDS: u64 = 5;

/// Environment-derived settings consumed once in `main`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Application name reported by the health endpoints.
    pub app_name: String,
    /// Release version reported by the health endpoints.
    pub release_version: String,
    /// Address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Minimum uptime before the readiness probe reports ready.
    pub ready_min_uptime_seconds: u64,
}

impl AppConfig {
    /// Read `APP_NAME`, `RELEASE_VERSION`, `BIND_ADDR` and
    /// `READY_MIN_UPTIME_SECONDS`, falling back to defaults for anything
    /// absent or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            app_name: std::env::var("APP_NAME").unwrap_or_else(|_| "discwatch".to_owned()),
            release_version: std::env::var("RELEASE_VERSION").unwrap_or_else(|_| "dev".to_owned()),
            bind_addr: resolve_bind_addr(std::env::var("BIND_ADDR").ok().as_deref()),
            ready_min_uptime_seconds: resolve_ready_threshold(
                std::env::var("READY_MIN_UPTIME_SECONDS").ok().as_deref(),
            ),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn resolve_bind_addr(raw: Option<&str>) -> SocketAddr {
    raw.and_then(|value| value.parse().ok())
        .unwrap_or_else(default_bind_addr)
}

fn resolve_ready_threshold(raw: Option<&str>) -> u64 {
    raw.and_then(|value| value.trim().parse().ok())
        .unwrap_or(DEFAULT_READY_MIN_UPTIME_SECONDS)
}
