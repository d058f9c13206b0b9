//! Error capture helpers.
//!
//! Funnel caught failures into the structured logger with a consistent
//! shape: scope, correlation id and the failure's rendered message.

use super::{LogEvent, Logger};

/// Record a client-side failure as a `client_error_event`.
pub fn capture_client_error(logger: &Logger, error: &(dyn std::error::Error)) {
    logger.error(decorate(LogEvent::new("client_error_event"), "client", error, None));
}

/// Record a server-side failure under the context event's message.
///
/// `context` carries the event message (`server_error_event` by convention
/// when nothing more specific applies) plus any request metadata such as
/// method and path.
pub fn capture_server_error(
    logger: &Logger,
    error: &(dyn std::error::Error),
    request_id: Option<&str>,
    context: LogEvent,
) {
    logger.error(decorate(context, "server", error, request_id));
}

fn decorate(
    event: LogEvent,
    scope: &str,
    error: &(dyn std::error::Error),
    request_id: Option<&str>,
) -> LogEvent {
    let mut event = event.scope(scope).with("errorMessage", error.to_string());
    if let Some(id) = request_id {
        event = event.request_id(id);
    }
    event
}
