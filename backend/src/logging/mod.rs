//! Structured request logging.
//!
//! Purpose: serialize leveled log events as single JSON lines on the process
//! output streams, filtering by severity and redacting sensitive fields
//! before anything is written. The logger is an explicitly constructed,
//! injectable object so tests can capture output; it never blocks or fails
//! its caller.

pub mod capture;
pub mod redact;

use std::io::Write as _;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

/// Log severity, ordered `debug < info < warn < error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Diagnostic detail, dropped by default.
    Debug,
    /// Routine lifecycle events.
    Info,
    /// Recoverable or caller-induced failures.
    Warn,
    /// Unexpected failures.
    Error,
}

/// Failure to parse a [`LogLevel`] from its lowercase name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level: {0}")]
pub struct ParseLogLevelError(String);

impl LogLevel {
    /// Numeric severity used for threshold comparison.
    #[must_use]
    pub const fn severity(self) -> u8 {
        match self {
            Self::Debug => 10,
            Self::Info => 20,
            Self::Warn => 30,
            Self::Error => 40,
        }
    }

    /// Lowercase name as it appears in serialized output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Resolve a configured level, falling back to `Info` when the value is
    /// absent or not one of `debug|info|warn|error` (case-insensitive).
    #[must_use]
    pub fn resolve(configured: Option<&str>) -> Self {
        configured
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(Self::Info)
    }

    /// Read the `LOG_LEVEL` environment variable, consumed once at logger
    /// construction.
    #[must_use]
    pub fn from_env() -> Self {
        Self::resolve(std::env::var("LOG_LEVEL").ok().as_deref())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ParseLogLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(ParseLogLevelError(other.to_owned())),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One log event: a message plus arbitrary structured fields.
///
/// Canonical metadata keys (`requestId`, `path`, `status`, `durationMs`,
/// `scope`) have dedicated builders; anything else goes through [`with`].
/// `timestamp` and `level` are injected at serialization time.
///
/// [`with`]: LogEvent::with
///
/// # Examples
/// ```
/// use backend::logging::LogEvent;
///
/// let event = LogEvent::new("api_request_start")
///     .scope("api")
///     .path("/markets")
///     .with("method", "GET");
/// ```
#[derive(Debug, Clone, Default)]
pub struct LogEvent {
    message: String,
    fields: Map<String, Value>,
}

impl LogEvent {
    /// Start an event with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fields: Map::new(),
        }
    }

    /// Attach an arbitrary field, replacing any previous value for the key.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Attach the canonical request correlation identifier.
    #[must_use]
    pub fn request_id(self, id: impl Into<String>) -> Self {
        self.with("requestId", id.into())
    }

    /// Attach the canonical operation path.
    #[must_use]
    pub fn path(self, path: impl Into<String>) -> Self {
        self.with("path", path.into())
    }

    /// Attach the canonical HTTP or operation status code.
    #[must_use]
    pub fn status(self, status: u16) -> Self {
        self.with("status", status)
    }

    /// Attach the canonical operation duration in milliseconds.
    #[must_use]
    pub fn duration_ms(self, duration_ms: u64) -> Self {
        self.with("durationMs", duration_ms)
    }

    /// Attach the canonical logical scope (api/server/client/ingress/...).
    #[must_use]
    pub fn scope(self, scope: impl Into<String>) -> Self {
        self.with("scope", scope.into())
    }
}

/// Destination for serialized log lines.
///
/// The production sink routes to the process streams; tests inject a capture
/// sink. Implementations must not fail the caller.
pub trait LogSink: Send + Sync {
    /// Deliver one serialized line at the given level.
    fn write(&self, level: LogLevel, line: &str);
}

struct ProcessSink;

impl LogSink for ProcessSink {
    fn write(&self, level: LogLevel, line: &str) {
        // Errors and warnings go to stderr, everything else to stdout.
        // Write failures are swallowed: logging never fails the caller.
        let result = match level {
            LogLevel::Warn | LogLevel::Error => writeln!(std::io::stderr().lock(), "{line}"),
            LogLevel::Debug | LogLevel::Info => writeln!(std::io::stdout().lock(), "{line}"),
        };
        let _ = result;
    }
}

/// Threshold-filtered structured logger.
///
/// Cheap to clone; clones share the sink and threshold. Each non-filtered
/// call writes exactly one line, synchronously, with no buffering.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

struct LoggerInner {
    threshold: u8,
    sink: Box<dyn LogSink>,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("threshold", &self.inner.threshold)
            .finish_non_exhaustive()
    }
}

impl Logger {
    /// Create a logger writing to the process output streams.
    #[must_use]
    pub fn new(level: LogLevel) -> Self {
        Self::with_sink(level, Box::new(ProcessSink))
    }

    /// Create a logger with an injected sink.
    #[must_use]
    pub fn with_sink(level: LogLevel, sink: Box<dyn LogSink>) -> Self {
        Self {
            inner: Arc::new(LoggerInner {
                threshold: level.severity(),
                sink,
            }),
        }
    }

    /// Emit an event at an explicit level.
    ///
    /// Events below the configured threshold are dropped without producing
    /// any output.
    pub fn log(&self, level: LogLevel, event: LogEvent) {
        if level.severity() < self.inner.threshold {
            return;
        }
        let line = serialize(level, event);
        self.inner.sink.write(level, &line);
    }

    /// Emit a debug-level event.
    pub fn debug(&self, event: LogEvent) {
        self.log(LogLevel::Debug, event);
    }

    /// Emit an info-level event.
    pub fn info(&self, event: LogEvent) {
        self.log(LogLevel::Info, event);
    }

    /// Emit a warn-level event.
    pub fn warn(&self, event: LogEvent) {
        self.log(LogLevel::Warn, event);
    }

    /// Emit an error-level event.
    pub fn error(&self, event: LogEvent) {
        self.log(LogLevel::Error, event);
    }
}

fn missing_string(fields: &Map<String, Value>, key: &str) -> bool {
    match fields.get(key) {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// Map alias spellings onto the canonical keys, then drop the aliases.
///
/// Aliases only fill a canonical key that is absent (or blank, for the
/// string-valued ones); they are removed from the payload either way.
fn normalize_fields(fields: &mut Map<String, Value>) {
    if missing_string(fields, "path") {
        if let Some(Value::String(pathname)) = fields.get("pathname") {
            let pathname = pathname.clone();
            fields.insert("path".to_owned(), Value::String(pathname));
        }
    }
    fields.remove("pathname");

    if !fields.contains_key("status") {
        if let Some(code @ Value::Number(_)) = fields.get("statusCode") {
            let code = code.clone();
            fields.insert("status".to_owned(), code);
        }
    }
    fields.remove("statusCode");

    if !fields.contains_key("durationMs") {
        if let Some(elapsed @ Value::Number(_)) = fields.get("elapsedMs") {
            let elapsed = elapsed.clone();
            fields.insert("durationMs".to_owned(), elapsed);
        }
    }
    fields.remove("elapsedMs");

    if missing_string(fields, "requestId") {
        let alias = match (fields.get("requestID"), fields.get("request_id")) {
            (Some(Value::String(id)), _) => Some(id.clone()),
            (_, Some(Value::String(id))) => Some(id.clone()),
            _ => None,
        };
        if let Some(id) = alias {
            fields.insert("requestId".to_owned(), Value::String(id));
        }
    }
    fields.remove("requestID");
    fields.remove("request_id");
}

fn serialize(level: LogLevel, event: LogEvent) -> String {
    let LogEvent {
        message,
        mut fields,
    } = event;

    normalize_fields(&mut fields);
    fields.insert("level".to_owned(), Value::from(level.as_str()));
    fields.insert("message".to_owned(), Value::from(message));
    if matches!(fields.get("timestamp"), None | Some(Value::Null)) {
        fields.insert(
            "timestamp".to_owned(),
            Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
    }

    redact::sanitize(&Value::Object(fields)).to_string()
}
