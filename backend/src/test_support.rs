//! Shared test doubles for the backend crate.
//!
//! Provides a capture sink for asserting on serialized log lines and a
//! scripted transport recording outbound requests while replaying queued
//! responses. Only compiled for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;

use crate::logging::{LogLevel, LogSink};
use crate::outbound::api::transport::{
    HttpTransport, TransportError, TransportRequest, TransportResponse,
};

/// Log sink recording every line for later assertions.
#[derive(Clone, Default)]
pub(crate) struct CaptureSink {
    lines: Arc<Mutex<Vec<(LogLevel, String)>>>,
}

impl CaptureSink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// All captured lines in emission order.
    pub(crate) fn lines(&self) -> Vec<(LogLevel, String)> {
        self.lines.lock().expect("capture sink lock").clone()
    }

    /// Captured lines parsed back into JSON entries.
    pub(crate) fn parsed_lines(&self) -> Vec<Value> {
        self.lines()
            .into_iter()
            .map(|(_, line)| serde_json::from_str(&line).expect("log lines are JSON"))
            .collect()
    }

    /// Parsed entries whose `message` field matches.
    pub(crate) fn entries_with_message(&self, message: &str) -> Vec<Value> {
        self.parsed_lines()
            .into_iter()
            .filter(|entry| entry["message"] == message)
            .collect()
    }
}

impl LogSink for CaptureSink {
    fn write(&self, level: LogLevel, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((level, line.to_owned()));
        }
    }
}

/// Transport double recording requests and replaying queued outcomes.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    requests: Mutex<Vec<TransportRequest>>,
    responses: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome for the next request.
    pub(crate) fn push_response(&self, response: Result<TransportResponse, TransportError>) {
        self.responses
            .lock()
            .expect("scripted transport lock")
            .push_back(response);
    }

    /// Requests observed so far, in order.
    pub(crate) fn requests(&self) -> Vec<TransportRequest> {
        self.requests
            .lock()
            .expect("scripted transport lock")
            .clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.requests
            .lock()
            .expect("scripted transport lock")
            .push(request);
        self.responses
            .lock()
            .expect("scripted transport lock")
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::network("no scripted response queued")))
    }
}

/// A JSON response with the given status and body.
pub(crate) fn json_response(status: u16, body: &Value) -> TransportResponse {
    let mut response = empty_response(status);
    response
        .headers
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response.body = body.to_string().into_bytes();
    response
}

/// A bodiless response with the given status.
pub(crate) fn empty_response(status: u16) -> TransportResponse {
    TransportResponse {
        status: StatusCode::from_u16(status).expect("valid status code"),
        headers: reqwest::header::HeaderMap::new(),
        body: Vec::new(),
    }
}
