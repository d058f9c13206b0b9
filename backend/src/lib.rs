//! Backend library modules.

pub mod api;
pub mod config;
pub mod doc;
pub mod logging;
pub mod middleware;
pub mod outbound;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

/// Correlation header read from inbound requests and stamped on every
/// outbound response.
pub const X_REQUEST_ID_HEADER: &str = "x-request-id";

/// Public OpenAPI surface used by tooling.
pub use doc::ApiDoc;
pub use middleware::{Correlation, RequestLog};
