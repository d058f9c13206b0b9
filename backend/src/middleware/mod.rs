//! Request middleware.
//!
//! Purpose: request-lifecycle concerns — correlation id propagation at the
//! ingress edge and start/end logging around API handlers.

pub mod correlation;
pub mod request_log;

pub use correlation::{Correlation, RequestId};
pub use request_log::RequestLog;

/// Rendered service failure, adapting actix errors to the capture helpers.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub(crate) struct HandlerFailure(pub(crate) String);
