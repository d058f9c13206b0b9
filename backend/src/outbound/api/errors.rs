//! Classification of failed HTTP responses into a closed error taxonomy.
//!
//! Backends answer failures with an optional JSON envelope
//! `{error: {type, message, details}, message}`. Envelope parsing fails
//! soft: anything that is not a JSON object under a JSON content type simply
//! yields no envelope.

use chrono::Utc;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde_json::Value;

use super::rate_limit;

const DEFAULT_ERROR_MESSAGE: &str = "Request failed";

/// Optional JSON error body shape returned by a backend on failure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorEnvelope {
    /// Structured error block, when present.
    pub error: Option<EnvelopeError>,
    /// Top-level fallback message.
    pub message: Option<String>,
}

/// The `error` block of an [`ErrorEnvelope`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvelopeError {
    /// Declared error type (`rate_limited`, `validation_error`, ...).
    pub kind: Option<String>,
    /// Human-readable message.
    pub message: Option<String>,
    /// Supplementary structured details.
    pub details: Option<Value>,
}

/// Failed API responses, classified.
///
/// Exactly one kind per instance; [`ApiError::RateLimited`] always reports
/// status 429.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// 4xx indicating bad input (400/422 or a declared `validation_error`).
    #[error("{message}")]
    Validation {
        /// HTTP status of the response.
        status: u16,
        /// Resolved error message.
        message: String,
        /// Envelope details, when present.
        details: Option<Value>,
    },
    /// Any other non-success response.
    #[error("{message}")]
    Http {
        /// HTTP status of the response.
        status: u16,
        /// Resolved error message.
        message: String,
        /// Envelope details, when present.
        details: Option<Value>,
    },
    /// 429 or a declared `rate_limited` failure, with a retry hint when one
    /// was advertised.
    #[error("{message}")]
    RateLimited {
        /// Resolved error message.
        message: String,
        /// Envelope details, when present.
        details: Option<Value>,
        /// Seconds to wait before retrying, when advertised.
        retry_after_seconds: Option<u64>,
    },
}

impl ApiError {
    /// Stable snake_case kind tag.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::Http { .. } => "http_error",
            Self::RateLimited { .. } => "rate_limited",
        }
    }

    /// HTTP status carried by the error; rate-limited errors are always 429.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::Validation { status, .. } | Self::Http { status, .. } => *status,
            Self::RateLimited { .. } => 429,
        }
    }

    /// Resolved error message.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Validation { message, .. }
            | Self::Http { message, .. }
            | Self::RateLimited { message, .. } => message,
        }
    }

    /// Envelope details, when present.
    #[must_use]
    pub const fn details(&self) -> Option<&Value> {
        match self {
            Self::Validation { details, .. }
            | Self::Http { details, .. }
            | Self::RateLimited { details, .. } => details.as_ref(),
        }
    }

    /// Retry hint in seconds; only rate-limited errors carry one.
    #[must_use]
    pub const fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            Self::RateLimited {
                retry_after_seconds,
                ..
            } => *retry_after_seconds,
            Self::Validation { .. } | Self::Http { .. } => None,
        }
    }
}

/// Attempt to read an error envelope out of a response body.
///
/// Returns `None` (never an error) unless the content type mentions
/// `application/json` and the body parses to a JSON object. Field extraction
/// is lenient: wrong-typed fields are dropped rather than failing the parse.
#[must_use]
pub fn try_parse_error_envelope(content_type: Option<&str>, body: &[u8]) -> Option<ErrorEnvelope> {
    let content_type = content_type?.to_lowercase();
    if !content_type.contains("application/json") {
        return None;
    }

    let parsed: Value = serde_json::from_slice(body).ok()?;
    let object = parsed.as_object()?;

    let error = object.get("error").and_then(Value::as_object).map(|block| EnvelopeError {
        kind: block.get("type").and_then(Value::as_str).map(str::to_owned),
        message: block.get("message").and_then(Value::as_str).map(str::to_owned),
        details: block.get("details").cloned(),
    });
    let message = object.get("message").and_then(Value::as_str).map(str::to_owned);

    Some(ErrorEnvelope { error, message })
}

/// Classify a failed response, resolving rate-limit hints against the
/// current clock.
#[must_use]
pub fn to_api_error(
    status: StatusCode,
    headers: &HeaderMap,
    envelope: Option<&ErrorEnvelope>,
) -> ApiError {
    to_api_error_at(status, headers, envelope, Utc::now())
}

/// Classify a failed response against an explicit clock.
///
/// Resolution order: 429 or a declared `rate_limited` type wins; then 400/422
/// or a declared `validation_error`; everything else is a generic HTTP error.
/// The message falls back through envelope error message, envelope top-level
/// message and status text.
#[must_use]
pub fn to_api_error_at(
    status: StatusCode,
    headers: &HeaderMap,
    envelope: Option<&ErrorEnvelope>,
    now: chrono::DateTime<Utc>,
) -> ApiError {
    let block = envelope.and_then(|e| e.error.as_ref());
    let message = block
        .and_then(|e| e.message.clone())
        .or_else(|| envelope.and_then(|e| e.message.clone()))
        .or_else(|| status.canonical_reason().map(str::to_owned))
        .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_owned());
    let details = block.and_then(|e| e.details.clone());
    let declared_kind = block.and_then(|e| e.kind.as_deref());

    if status == StatusCode::TOO_MANY_REQUESTS || declared_kind == Some("rate_limited") {
        let retry_after_seconds =
            rate_limit::parse_rate_limit_meta(headers, details.as_ref(), now).retry_after_seconds;
        return ApiError::RateLimited {
            message,
            details,
            retry_after_seconds,
        };
    }

    if status == StatusCode::BAD_REQUEST
        || status == StatusCode::UNPROCESSABLE_ENTITY
        || declared_kind == Some("validation_error")
    {
        return ApiError::Validation {
            status: status.as_u16(),
            message,
            details,
        };
    }

    ApiError::Http {
        status: status.as_u16(),
        message,
        details,
    }
}
