//! Start/end logging around API handlers.
//!
//! Resolves the correlation id the same way the ingress middleware does
//! (reuse the inbound header or generate one, so the wrapper also works
//! standalone), stamps it on request and response, and emits exactly one
//! `request_start` and one `request_end` event per request whatever the
//! outcome. A failure the handler could not render itself becomes a single
//! `api_handler_exception` event plus a generic 500 `{error, requestId}`.

use std::task::{Context, Poll};
use std::time::Instant;

use actix_web::body::EitherBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::{Error, HttpResponse};
use futures_util::future::{ready, LocalBoxFuture, Ready};

use crate::api::error::ErrorBody;
use crate::logging::capture::capture_server_error;
use crate::logging::{LogEvent, Logger};
use crate::X_REQUEST_ID_HEADER;

use super::correlation::{resolve_request_id, RequestId};
use super::HandlerFailure;

/// API-route wrapper emitting paired `request_start`/`request_end` events.
///
/// # Examples
/// ```
/// use actix_web::App;
/// use backend::logging::{LogLevel, Logger};
/// use backend::RequestLog;
///
/// let app = App::new().wrap(RequestLog::new(Logger::new(LogLevel::Info)));
/// ```
#[derive(Clone)]
pub struct RequestLog {
    logger: Logger,
}

impl RequestLog {
    /// Build the middleware around the shared logger.
    #[must_use]
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequestLog
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestLogMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLogMiddleware {
            service,
            logger: self.logger.clone(),
        }))
    }
}

/// Service wrapper produced by [`RequestLog`].
///
/// Applications should not use this type directly.
pub struct RequestLogMiddleware<S> {
    service: S,
    logger: Logger,
}

impl<S, B> Service<ServiceRequest> for RequestLogMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let request_id = resolve_request_id(req.headers());
        let header_value = request_id.to_string();
        if let Ok(value) = HeaderValue::from_str(&header_value) {
            req.headers_mut()
                .insert(HeaderName::from_static(X_REQUEST_ID_HEADER), value);
        }

        let method = req.method().as_str().to_owned();
        let path = req.path().to_owned();
        self.logger.info(
            LogEvent::new("request_start")
                .scope("api")
                .request_id(request_id.as_str())
                .with("method", method.clone())
                .path(path.clone()),
        );

        let started = Instant::now();
        let http_req = req.request().clone();
        let logger = self.logger.clone();
        let fut = self.service.call(req);
        Box::pin(RequestId::scope(request_id.clone(), async move {
            let end_event = |status: u16| {
                LogEvent::new("request_end")
                    .scope("api")
                    .request_id(request_id.as_str())
                    .with("method", method.clone())
                    .path(path.clone())
                    .status(status)
                    .duration_ms(elapsed_ms(started))
            };

            match fut.await {
                Ok(mut res) => {
                    if let Ok(value) = HeaderValue::from_str(&header_value) {
                        res.headers_mut()
                            .insert(HeaderName::from_static(X_REQUEST_ID_HEADER), value);
                    }

                    // A handler failure that already rendered a response (via
                    // ResponseError) is logged but the response is kept.
                    if let Some(error) = res.response().error() {
                        capture_server_error(
                            &logger,
                            &HandlerFailure(error.to_string()),
                            Some(request_id.as_str()),
                            LogEvent::new("api_handler_exception"),
                        );
                    }

                    logger.info(end_event(res.status().as_u16()));
                    Ok(res.map_into_left_body())
                }
                Err(error) => {
                    capture_server_error(
                        &logger,
                        &HandlerFailure(error.to_string()),
                        Some(request_id.as_str()),
                        LogEvent::new("api_handler_exception"),
                    );

                    let response = HttpResponse::InternalServerError()
                        .insert_header((X_REQUEST_ID_HEADER, header_value.clone()))
                        .json(ErrorBody::internal(Some(header_value)));
                    let res = ServiceResponse::new(http_req, response).map_into_right_body();
                    logger.info(end_event(res.status().as_u16()));
                    Ok(res)
                }
            }
        }))
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ServerError;
    use crate::logging::LogLevel;
    use crate::test_support::CaptureSink;
    use actix_web::{test, web, App};

    fn capture_logger() -> (Logger, CaptureSink) {
        let sink = CaptureSink::new();
        (Logger::with_sink(LogLevel::Debug, Box::new(sink.clone())), sink)
    }

    #[actix_web::test]
    async fn emits_matching_start_and_end_events_exactly_once() {
        let (logger, sink) = capture_logger();
        let app = test::init_service(App::new().wrap(RequestLog::new(logger)).route(
            "/markets",
            web::get().to(|| async { HttpResponse::Ok().finish() }),
        ))
        .await;

        let req = test::TestRequest::get()
            .uri("/markets")
            .insert_header((X_REQUEST_ID_HEADER, "req-api-1"))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(
            res.headers()
                .get(X_REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok()),
            Some("req-api-1")
        );

        let starts = sink.entries_with_message("request_start");
        let ends = sink.entries_with_message("request_end");
        assert_eq!(starts.len(), 1);
        assert_eq!(ends.len(), 1);
        assert_eq!(starts[0]["requestId"], "req-api-1");
        assert_eq!(ends[0]["requestId"], "req-api-1");
        assert_eq!(ends[0]["status"], 200);
        assert_eq!(ends[0]["path"], "/markets");
        assert!(ends[0]["durationMs"].is_u64());
    }

    #[actix_web::test]
    async fn generates_an_id_when_the_inbound_header_is_missing() {
        let (logger, sink) = capture_logger();
        let app = test::init_service(App::new().wrap(RequestLog::new(logger)).route(
            "/",
            web::get().to(|| async { HttpResponse::Ok().finish() }),
        ))
        .await;

        let req = test::TestRequest::get().uri("/").to_request();
        let res = test::call_service(&app, req).await;

        let echoed = res
            .headers()
            .get(X_REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .expect("response carries a generated id")
            .to_owned();

        let starts = sink.entries_with_message("request_start");
        let ends = sink.entries_with_message("request_end");
        assert_eq!(starts[0]["requestId"], echoed.as_str());
        assert_eq!(ends[0]["requestId"], echoed.as_str());
    }

    #[actix_web::test]
    async fn handler_errors_log_one_exception_and_still_end_once() {
        let (logger, sink) = capture_logger();
        let app = test::init_service(App::new().wrap(RequestLog::new(logger)).route(
            "/boom",
            web::get().to(|| async {
                Err::<HttpResponse, ServerError>(ServerError::internal("boom"))
            }),
        ))
        .await;

        let req = test::TestRequest::get()
            .uri("/boom")
            .insert_header((X_REQUEST_ID_HEADER, "req-boom"))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status().as_u16(), 500);

        let exceptions = sink.entries_with_message("api_handler_exception");
        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0]["requestId"], "req-boom");
        assert_eq!(exceptions[0]["scope"], "server");
        assert_eq!(exceptions[0]["errorMessage"], "boom");

        let ends = sink.entries_with_message("request_end");
        assert_eq!(ends.len(), 1, "end fires exactly once on failure");
        assert_eq!(ends[0]["status"], 500);
        assert_eq!(ends[0]["requestId"], "req-boom");
    }

    #[actix_web::test]
    async fn service_failures_become_a_generic_500_with_the_request_id() {
        let (logger, sink) = capture_logger();
        let app = test::init_service(
            App::new()
                .wrap_fn(|_req, _srv| {
                    ready(Err::<ServiceResponse, Error>(
                        actix_web::error::ErrorInternalServerError("broken pipe"),
                    ))
                })
                .wrap(RequestLog::new(logger))
                .route("/", web::get().to(|| async { HttpResponse::Ok().finish() })),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/")
            .insert_header((X_REQUEST_ID_HEADER, "req-svc"))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status().as_u16(), 500);

        let body: ErrorBody = test::read_body_json(res).await;
        assert_eq!(body.error, "Internal Server Error");
        assert_eq!(body.request_id.as_deref(), Some("req-svc"));

        assert_eq!(sink.entries_with_message("api_handler_exception").len(), 1);
        let ends = sink.entries_with_message("request_end");
        assert_eq!(ends.len(), 1);
        assert_eq!(ends[0]["status"], 500);
    }
}
