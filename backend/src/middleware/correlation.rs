//! Ingress middleware attaching a request correlation identifier.
//!
//! Each incoming request carries an `x-request-id`: the inbound header is
//! reused when present, generated otherwise. The identifier is stamped on
//! the forwarded request and the outgoing response, kept in task-local
//! storage for correlation across logs and error payloads, and every
//! request produces one ingress `request_start` event.
//!
//! Tokio task-local variables are not inherited across spawned tasks. Use
//! [`RequestId::scope`] when spawning new tasks or moving work onto blocking
//! threads to ensure the active identifier propagates correctly.

use std::future::Future;
use std::task::{Context, Poll};

use actix_web::body::EitherBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{HeaderMap, HeaderName, HeaderValue};
use actix_web::{Error, HttpResponse};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use tokio::task_local;
use uuid::Uuid;

use crate::api::error::ErrorBody;
use crate::logging::capture::capture_server_error;
use crate::logging::{LogEvent, Logger};
use crate::X_REQUEST_ID_HEADER;

use super::HandlerFailure;

task_local! {
    static REQUEST_ID: RequestId;
}

/// Forwarding headers copied into the ingress start event when present and
/// non-empty.
const FORWARDED_HEADERS: [&str; 3] = ["x-forwarded-for", "x-forwarded-proto", "x-forwarded-host"];

/// Per-request correlation identifier exposed via task-local storage.
///
/// # Examples
/// ```
/// use backend::middleware::correlation::RequestId;
///
/// async fn handler() {
///     if let Some(id) = RequestId::current() {
///         println!("request id: {id}");
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the current request identifier if one is in scope.
    #[must_use]
    pub fn current() -> Option<Self> {
        REQUEST_ID.try_with(Clone::clone).ok()
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Execute the provided future with the supplied identifier in scope.
    ///
    /// # Examples
    /// ```
    /// use backend::middleware::correlation::RequestId;
    ///
    /// # tokio::runtime::Runtime::new().unwrap().block_on(async {
    /// let request_id = RequestId::from("req-1");
    /// let observed = RequestId::scope(request_id.clone(), async move {
    ///     RequestId::current()
    /// })
    /// .await;
    /// assert_eq!(observed, Some(request_id));
    /// # });
    /// ```
    pub async fn scope<Fut>(request_id: RequestId, fut: Fut) -> Fut::Output
    where
        Fut: Future,
    {
        REQUEST_ID.scope(request_id, fut).await
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Reuse a non-empty inbound `x-request-id` header or generate a fresh id.
pub(crate) fn resolve_request_id(headers: &HeaderMap) -> RequestId {
    headers
        .get(X_REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map_or_else(RequestId::generate, RequestId::from)
}

pub(crate) fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Ingress middleware assigning the correlation id, stamping it on the
/// response, and converting uncaught downstream failures into a generic
/// 500 `{error, requestId}` payload.
///
/// # Examples
/// ```
/// use actix_web::App;
/// use backend::logging::{LogLevel, Logger};
/// use backend::Correlation;
///
/// let app = App::new().wrap(Correlation::new(Logger::new(LogLevel::Info)));
/// ```
#[derive(Clone)]
pub struct Correlation {
    logger: Logger,
}

impl Correlation {
    /// Build the middleware around the shared logger.
    #[must_use]
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Correlation
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = CorrelationMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(CorrelationMiddleware {
            service,
            logger: self.logger.clone(),
        }))
    }
}

/// Service wrapper produced by [`Correlation`].
///
/// Applications should not use this type directly.
pub struct CorrelationMiddleware<S> {
    service: S,
    logger: Logger,
}

impl<S, B> Service<ServiceRequest> for CorrelationMiddleware<S>
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
        let mut event = LogEvent::new("request_start")
            .scope("ingress")
            .request_id(request_id.as_str())
            .with("method", method.clone())
            .path(path.clone());
        if let Some(agent) = header_str(req.headers(), "user-agent") {
            event = event.with("userAgent", agent);
        }
        for name in FORWARDED_HEADERS {
            if let Some(value) = header_str(req.headers(), name).filter(|value| !value.is_empty()) {
                event = event.with(name, value);
            }
        }
        self.logger.info(event);

        let http_req = req.request().clone();
        let logger = self.logger.clone();
        let fut = self.service.call(req);
        Box::pin(RequestId::scope(request_id.clone(), async move {
            match fut.await {
                Ok(mut res) => {
                    if let Ok(value) = HeaderValue::from_str(&header_value) {
                        res.headers_mut()
                            .insert(HeaderName::from_static(X_REQUEST_ID_HEADER), value);
                    }
                    Ok(res.map_into_left_body())
                }
                Err(error) => {
                    capture_server_error(
                        &logger,
                        &HandlerFailure(error.to_string()),
                        Some(request_id.as_str()),
                        LogEvent::new("middleware_failure")
                            .with("method", method)
                            .path(path),
                    );

                    let response = HttpResponse::InternalServerError()
                        .insert_header((X_REQUEST_ID_HEADER, header_value.clone()))
                        .json(ErrorBody::internal(Some(header_value)));
                    Ok(ServiceResponse::new(http_req, response).map_into_right_body())
                }
            }
        }))
    }
}
