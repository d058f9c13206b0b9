//! Typed API client.
//!
//! Builds authenticated, correlation-stamped requests against a base URL,
//! logs a start event and exactly one terminal event per call, and
//! classifies failures through the error taxonomy. The client holds no
//! mutable state: concurrent calls from one instance are independent.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures_util::future::{AbortRegistration, Abortable};
use pagination::QueryParams;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::logging::{LogEvent, Logger};
use crate::X_REQUEST_ID_HEADER;

use super::errors::{self, ApiError};
use super::rate_limit;
use super::transport::{HttpTransport, ReqwestTransport, TransportError, TransportRequest};

/// Source of the bearer token attached to outbound requests.
///
/// Token retrieval may suspend (e.g. a refresh against a session service).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JwtProvider: Send + Sync {
    /// Current bearer token, when one is available.
    async fn jwt(&self) -> Option<String>;
}

/// Per-request options for [`ApiClient::request`].
#[derive(Debug, Default)]
pub struct RequestOptions {
    /// HTTP method; defaults to `GET`.
    pub method: Method,
    /// JSON body; its presence switches on `Content-Type: application/json`.
    pub body: Option<Value>,
    /// Caller headers, applied last so they override everything.
    pub headers: Option<HeaderMap>,
    /// Cancellation signal aborting the underlying network call.
    pub signal: Option<AbortRegistration>,
}

impl RequestOptions {
    /// Options for a bodyless request with the given method.
    #[must_use]
    pub fn method(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    /// Options for a JSON `POST`.
    #[must_use]
    pub fn post(body: Value) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            ..Self::default()
        }
    }
}

/// Failures surfaced by [`ApiClient::request`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server answered with a non-success status.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// The request never produced an HTTP response.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The caller's cancellation signal fired.
    #[error("request was aborted")]
    Aborted,
    /// A success response carried an unparsable body.
    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),
    /// The request path could not be joined onto the base URL.
    #[error("invalid request url: {0}")]
    Url(#[from] url::ParseError),
    /// A configured header value was not representable.
    #[error("invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),
    /// Pagination parameters failed validation before any network call.
    #[error(transparent)]
    Pagination(#[from] pagination::PaginationError),
    /// A body-bearing endpoint answered 204. Raised by domain services only.
    #[error("expected a response body but none was returned")]
    MissingBody,
}

/// HTTP API client bound to a base URL.
///
/// Cheap to clone; clones share the transport and logger.
#[derive(Clone)]
pub struct ApiClient {
    base_url: Url,
    transport: Arc<dyn HttpTransport>,
    jwt_provider: Option<Arc<dyn JwtProvider>>,
    default_headers: HeaderMap,
    request_id: Option<String>,
    logger: Logger,
}

impl ApiClient {
    /// Create a client over the production reqwest transport.
    #[must_use]
    pub fn new(base_url: Url, logger: Logger) -> Self {
        Self {
            base_url,
            transport: Arc::new(ReqwestTransport::new()),
            jwt_provider: None,
            default_headers: HeaderMap::new(),
            request_id: None,
            logger,
        }
    }

    /// Swap in another transport (tests, decorators).
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = transport;
        self
    }

    /// Attach a bearer-token source.
    #[must_use]
    pub fn with_jwt_provider(mut self, provider: Arc<dyn JwtProvider>) -> Self {
        self.jwt_provider = Some(provider);
        self
    }

    /// Headers sent on every request unless overridden per call.
    #[must_use]
    pub fn with_default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = headers;
        self
    }

    /// Fixed correlation id stamped on every outbound request.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Issue a request and decode the JSON response.
    ///
    /// Returns `Ok(None)` for a 204 response, `Ok(Some(T))` otherwise.
    /// Every call emits one `api_request_start` event and exactly one
    /// terminal success-or-failure event; errors are logged once and
    /// re-raised, never swallowed.
    ///
    /// # Errors
    /// See [`ClientError`] for the full failure surface.
    pub async fn request<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
        query: Option<&QueryParams>,
    ) -> Result<Option<T>, ClientError> {
        let started = Instant::now();
        let normalized_path = normalize_path(path);
        let url = build_url(&self.base_url, path, query)?;

        let jwt = match &self.jwt_provider {
            Some(provider) => provider.jwt().await,
            None => None,
        };

        let mut headers = self.default_headers.clone();
        if let Some(request_id) = &self.request_id {
            headers.insert(
                HeaderName::from_static(X_REQUEST_ID_HEADER),
                HeaderValue::from_str(request_id)?,
            );
        }
        let body = match &options.body {
            Some(value) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                Some(serde_json::to_string(value)?)
            }
            None => None,
        };
        if let Some(jwt) = jwt {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {jwt}"))?,
            );
        }
        if let Some(extra) = &options.headers {
            for (name, value) in extra {
                headers.insert(name.clone(), value.clone());
            }
        }

        let method = options.method.clone();
        let outbound_request_id = headers
            .get(X_REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        self.logger.info(with_request_id(
            LogEvent::new("api_request_start")
                .scope("api")
                .with("method", method.as_str())
                .path(normalized_path.clone()),
            outbound_request_id.as_deref(),
        ));

        let send = self.transport.execute(TransportRequest {
            method: method.clone(),
            url,
            headers,
            body,
        });
        let sent = match options.signal {
            Some(registration) => match Abortable::new(send, registration).await {
                Ok(outcome) => outcome,
                Err(_aborted) => {
                    self.logger.warn(with_request_id(
                        LogEvent::new("api_request_failure")
                            .scope("api")
                            .with("method", method.as_str())
                            .path(normalized_path.clone())
                            .duration_ms(elapsed_ms(started))
                            .with("failureKind", "aborted")
                            .with("errorMessage", "request was aborted"),
                        outbound_request_id.as_deref(),
                    ));
                    return Err(ClientError::Aborted);
                }
            },
            None => send.await,
        };
        let response = match sent {
            Ok(response) => response,
            Err(error) => {
                self.logger.error(with_request_id(
                    LogEvent::new("api_request_failure")
                        .scope("api")
                        .with("method", method.as_str())
                        .path(normalized_path.clone())
                        .duration_ms(elapsed_ms(started))
                        .with("errorMessage", error.to_string()),
                    outbound_request_id.as_deref(),
                ));
                return Err(ClientError::Transport(error));
            }
        };

        // The server's echoed id wins over the outbound one in terminal events.
        let request_id = response
            .header(X_REQUEST_ID_HEADER)
            .map(str::to_owned)
            .or(outbound_request_id);
        let duration_ms = elapsed_ms(started);

        if !response.status.is_success() {
            let envelope =
                errors::try_parse_error_envelope(response.header(CONTENT_TYPE.as_str()), &response.body);
            let api_error = errors::to_api_error(response.status, &response.headers, envelope.as_ref());
            let meta = rate_limit::parse_rate_limit_meta(
                &response.headers,
                envelope
                    .as_ref()
                    .and_then(|e| e.error.as_ref())
                    .and_then(|e| e.details.as_ref()),
                chrono::Utc::now(),
            );

            let mut event = with_request_id(
                LogEvent::new("api_request_failure")
                    .scope("api")
                    .with("method", method.as_str())
                    .path(normalized_path.clone())
                    .status(response.status.as_u16())
                    .duration_ms(duration_ms)
                    .with("kind", api_error.kind()),
                request_id.as_deref(),
            );
            if let Some(retry_after_seconds) = meta.retry_after_seconds {
                event = event.with("retryAfterSeconds", retry_after_seconds);
            }
            if api_error.status() < 500 {
                self.logger.warn(event);
            } else {
                self.logger.error(event);
            }

            return Err(ClientError::Api(api_error));
        }

        if response.status == StatusCode::NO_CONTENT {
            self.logger.info(with_request_id(
                LogEvent::new("api_request_success")
                    .scope("api")
                    .with("method", method.as_str())
                    .path(normalized_path)
                    .status(response.status.as_u16())
                    .duration_ms(duration_ms),
                request_id.as_deref(),
            ));
            return Ok(None);
        }

        match serde_json::from_slice::<T>(&response.body) {
            Ok(parsed) => {
                self.logger.info(with_request_id(
                    LogEvent::new("api_request_success")
                        .scope("api")
                        .with("method", method.as_str())
                        .path(normalized_path)
                        .status(response.status.as_u16())
                        .duration_ms(duration_ms),
                    request_id.as_deref(),
                ));
                Ok(Some(parsed))
            }
            Err(error) => {
                self.logger.error(with_request_id(
                    LogEvent::new("api_request_failure")
                        .scope("api")
                        .with("method", method.as_str())
                        .path(normalized_path)
                        .status(response.status.as_u16())
                        .duration_ms(duration_ms)
                        .with("failureKind", "response_parse_error")
                        .with("errorMessage", error.to_string()),
                    request_id.as_deref(),
                ));
                Err(ClientError::Decode(error))
            }
        }
    }
}

fn with_request_id(event: LogEvent, request_id: Option<&str>) -> LogEvent {
    match request_id {
        Some(id) => event.request_id(id),
        None => event,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Strip any query, ensure a single leading slash and collapse duplicate
/// separators; used for log events, not for the wire.
fn normalize_path(path: &str) -> String {
    let stripped = path.split('?').next().unwrap_or(path);
    let mut normalized = String::with_capacity(stripped.len() + 1);
    if !stripped.starts_with('/') {
        normalized.push('/');
    }
    let mut previous_slash = false;
    for c in stripped.chars() {
        if c == '/' {
            if previous_slash {
                continue;
            }
            previous_slash = true;
        } else {
            previous_slash = false;
        }
        normalized.push(c);
    }
    normalized
}

/// Join the request path onto the base URL, preserving any base path, and
/// attach the encoded query.
fn build_url(
    base_url: &Url,
    path: &str,
    query: Option<&QueryParams>,
) -> Result<Url, url::ParseError> {
    let mut base = base_url.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }

    let mut url = base.join(path.trim_start_matches('/'))?;
    if let Some(query) = query {
        let encoded = query.to_query_string();
        if encoded.is_empty() {
            url.set_query(None);
        } else {
            url.set_query(Some(&encoded));
        }
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{json_response, CaptureSink, ScriptedTransport};
    use crate::logging::LogLevel;
    use futures_util::future::AbortHandle;
    use reqwest::header::RETRY_AFTER;
    use serde_json::json;

    fn capture_logger() -> (Logger, CaptureSink) {
        let sink = CaptureSink::new();
        (Logger::with_sink(LogLevel::Debug, Box::new(sink.clone())), sink)
    }

    fn base_client(transport: &Arc<ScriptedTransport>, logger: Logger) -> ApiClient {
        let url = Url::parse("https://api.example.com").expect("valid base url");
        ApiClient::new(url, logger).with_transport(Arc::clone(transport) as Arc<dyn HttpTransport>)
    }

    #[tokio::test]
    async fn adds_bearer_auth_header_when_jwt_is_provided() {
        let (logger, _sink) = capture_logger();
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_response(Ok(json_response(200, &json!({ "ok": true }))));

        let mut provider = MockJwtProvider::new();
        provider.expect_jwt().returning(|| Some("abc123".to_owned()));

        let client = base_client(&transport, logger).with_jwt_provider(Arc::new(provider));
        client
            .request::<Value>("/me", RequestOptions::default(), None)
            .await
            .expect("request succeeds");

        let sent = transport.requests().remove(0);
        let authorization = sent
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        assert_eq!(authorization.as_deref(), Some("Bearer abc123"));
    }

    #[tokio::test]
    async fn caller_supplied_authorization_header_wins() {
        let (logger, _sink) = capture_logger();
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_response(Ok(json_response(200, &json!({ "ok": true }))));

        let mut provider = MockJwtProvider::new();
        provider.expect_jwt().returning(|| Some("abc123".to_owned()));

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer caller"));

        let client = base_client(&transport, logger).with_jwt_provider(Arc::new(provider));
        client
            .request::<Value>(
                "/me",
                RequestOptions {
                    headers: Some(headers),
                    ..RequestOptions::default()
                },
                None,
            )
            .await
            .expect("request succeeds");

        let sent = transport.requests().remove(0);
        let authorization = sent
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        assert_eq!(authorization.as_deref(), Some("Bearer caller"));
    }

    #[tokio::test]
    async fn preserves_base_path_when_building_request_urls() {
        let (logger, _sink) = capture_logger();
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_response(Ok(json_response(200, &json!({ "ok": true }))));

        let url = Url::parse("https://api.example.com/v1").expect("valid base url");
        let client =
            ApiClient::new(url, logger).with_transport(Arc::clone(&transport) as Arc<dyn HttpTransport>);
        client
            .request::<Value>("/markets", RequestOptions::default(), None)
            .await
            .expect("request succeeds");

        let sent = transport.requests().remove(0);
        assert_eq!(sent.url.as_str(), "https://api.example.com/v1/markets");
    }

    #[tokio::test]
    async fn attaches_query_string_and_request_id_and_content_type() {
        let (logger, _sink) = capture_logger();
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_response(Ok(json_response(200, &json!({ "ok": true }))));

        let mut query = QueryParams::new();
        query.set("limit", "25");
        query.set("offset", "10");

        let client = base_client(&transport, logger).with_request_id("req-7");
        client
            .request::<Value>(
                "/markets",
                RequestOptions::post(json!({ "query": "jazz" })),
                Some(&query),
            )
            .await
            .expect("request succeeds");

        let sent = transport.requests().remove(0);
        assert_eq!(
            sent.url.as_str(),
            "https://api.example.com/markets?limit=25&offset=10"
        );
        assert_eq!(
            sent.headers
                .get(X_REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok()),
            Some("req-7")
        );
        assert_eq!(
            sent.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            Some("application/json")
        );
        assert_eq!(sent.body.as_deref(), Some("{\"query\":\"jazz\"}"));
        assert_eq!(sent.method, Method::POST);
    }

    #[tokio::test]
    async fn returns_none_for_204_and_logs_success() {
        let (logger, sink) = capture_logger();
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_response(Ok(crate::test_support::empty_response(204)));

        let client = base_client(&transport, logger);
        let parsed: Option<Value> = client
            .request("/watch-rules/42", RequestOptions::method(Method::DELETE), None)
            .await
            .expect("204 is success");
        assert_eq!(parsed, None);

        let successes = sink.entries_with_message("api_request_success");
        assert_eq!(successes.len(), 1);
        assert_eq!(successes[0]["status"], 204);
    }

    #[tokio::test]
    async fn classifies_error_responses_and_logs_once() {
        let (logger, sink) = capture_logger();
        let transport = Arc::new(ScriptedTransport::new());
        let mut response = json_response(
            429,
            &json!({ "error": { "type": "rate_limited", "message": "Slow down" } }),
        );
        response
            .headers
            .insert(RETRY_AFTER, HeaderValue::from_static("12"));
        transport.push_response(Ok(response));

        let client = base_client(&transport, logger);
        let error = client
            .request::<Value>("/markets", RequestOptions::default(), None)
            .await
            .expect_err("429 must fail");

        let ClientError::Api(api_error) = error else {
            panic!("expected an api error");
        };
        assert_eq!(api_error.kind(), "rate_limited");
        assert_eq!(api_error.retry_after_seconds(), Some(12));

        let failures = sink.entries_with_message("api_request_failure");
        assert_eq!(failures.len(), 1, "exactly one terminal failure event");
        assert_eq!(failures[0]["kind"], "rate_limited");
        assert_eq!(failures[0]["retryAfterSeconds"], 12);
        // 429 < 500 classifies as a warning.
        let warn_lines: Vec<_> = sink
            .lines()
            .into_iter()
            .filter(|(level, _)| *level == LogLevel::Warn)
            .collect();
        assert_eq!(warn_lines.len(), 1);
        assert!(sink.entries_with_message("api_request_success").is_empty());
    }

    #[tokio::test]
    async fn server_errors_log_at_error_level() {
        let (logger, sink) = capture_logger();
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_response(Ok(json_response(500, &json!({ "message": "boom" }))));

        let client = base_client(&transport, logger);
        let error = client
            .request::<Value>("/markets", RequestOptions::default(), None)
            .await
            .expect_err("500 must fail");
        assert!(matches!(error, ClientError::Api(_)));

        let error_lines: Vec<_> = sink
            .lines()
            .into_iter()
            .filter(|(level, _)| *level == LogLevel::Error)
            .collect();
        assert_eq!(error_lines.len(), 1);
    }

    #[tokio::test]
    async fn parse_failures_are_logged_and_reraised_without_a_success_event() {
        let (logger, sink) = capture_logger();
        let transport = Arc::new(ScriptedTransport::new());
        let mut response = crate::test_support::empty_response(200);
        response.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        response.body = b"not-json".to_vec();
        transport.push_response(Ok(response));

        let client = base_client(&transport, logger);
        let error = client
            .request::<Value>("/markets", RequestOptions::default(), None)
            .await
            .expect_err("unparsable body must fail");
        assert!(matches!(error, ClientError::Decode(_)));

        assert!(sink.entries_with_message("api_request_success").is_empty());
        let failures = sink.entries_with_message("api_request_failure");
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0]["failureKind"], "response_parse_error");
    }

    #[tokio::test]
    async fn transport_failures_log_an_error_and_propagate() {
        let (logger, sink) = capture_logger();
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_response(Err(TransportError::network("connection refused")));

        let client = base_client(&transport, logger);
        let error = client
            .request::<Value>("/markets", RequestOptions::default(), None)
            .await
            .expect_err("network failure must fail");
        assert!(matches!(error, ClientError::Transport(_)));

        let failures = sink.entries_with_message("api_request_failure");
        assert_eq!(failures.len(), 1);
        assert_eq!(
            failures[0]["errorMessage"],
            "network failure: connection refused"
        );
    }

    #[tokio::test]
    async fn aborted_requests_log_a_warning_and_never_reach_the_transport() {
        let (logger, sink) = capture_logger();
        let transport = Arc::new(ScriptedTransport::new());

        let (handle, registration) = AbortHandle::new_pair();
        handle.abort();

        let client = base_client(&transport, logger);
        let error = client
            .request::<Value>(
                "/markets",
                RequestOptions {
                    signal: Some(registration),
                    ..RequestOptions::default()
                },
                None,
            )
            .await
            .expect_err("aborted call must fail");
        assert!(matches!(error, ClientError::Aborted));

        assert!(transport.requests().is_empty());
        let failures = sink.entries_with_message("api_request_failure");
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0]["failureKind"], "aborted");
        let warn_lines: Vec<_> = sink
            .lines()
            .into_iter()
            .filter(|(level, _)| *level == LogLevel::Warn)
            .collect();
        assert_eq!(warn_lines.len(), 1);
    }

    #[tokio::test]
    async fn every_call_emits_start_then_exactly_one_terminal_event() {
        let (logger, sink) = capture_logger();
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_response(Ok(json_response(200, &json!({ "ok": true }))));
        transport.push_response(Ok(json_response(503, &json!({ "message": "down" }))));

        let client = base_client(&transport, logger);
        let _ok = client
            .request::<Value>("/markets", RequestOptions::default(), None)
            .await
            .expect("first call succeeds");
        let _err = client
            .request::<Value>("/markets", RequestOptions::default(), None)
            .await
            .expect_err("second call fails");

        assert_eq!(sink.entries_with_message("api_request_start").len(), 2);
        assert_eq!(sink.entries_with_message("api_request_success").len(), 1);
        assert_eq!(sink.entries_with_message("api_request_failure").len(), 1);
    }

    #[tokio::test]
    async fn response_request_id_overrides_outbound_id_in_terminal_events() {
        let (logger, sink) = capture_logger();
        let transport = Arc::new(ScriptedTransport::new());
        let mut response = json_response(200, &json!({ "ok": true }));
        response.headers.insert(
            HeaderName::from_static(X_REQUEST_ID_HEADER),
            HeaderValue::from_static("server-id"),
        );
        transport.push_response(Ok(response));

        let client = base_client(&transport, logger).with_request_id("client-id");
        client
            .request::<Value>("/me", RequestOptions::default(), None)
            .await
            .expect("request succeeds");

        let starts = sink.entries_with_message("api_request_start");
        assert_eq!(starts[0]["requestId"], "client-id");
        let successes = sink.entries_with_message("api_request_success");
        assert_eq!(successes[0]["requestId"], "server-id");
    }

    #[test]
    fn normalize_path_strips_queries_and_collapses_slashes() {
        assert_eq!(normalize_path("/markets?limit=5"), "/markets");
        assert_eq!(normalize_path("markets"), "/markets");
        assert_eq!(normalize_path("//markets///search"), "/markets/search");
        assert_eq!(normalize_path(""), "/");
    }

    #[test]
    fn build_url_keeps_existing_query_handling_simple() {
        let base = Url::parse("https://api.example.com/v1").expect("valid base url");
        let url = build_url(&base, "/markets", None).expect("joins");
        assert_eq!(url.as_str(), "https://api.example.com/v1/markets");

        let mut query = QueryParams::new();
        query.set("cursor", "abc");
        let url = build_url(&base, "markets", Some(&query)).expect("joins");
        assert_eq!(url.as_str(), "https://api.example.com/v1/markets?cursor=abc");
    }
}
