//! Rate-limit metadata extraction.
//!
//! `Retry-After` carries either integer seconds or an HTTP date; error
//! envelopes may carry a `retry_after_seconds` hint in their details. The
//! header wins; details are a fallback only.

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde_json::Value;

/// Parsed rate-limit hints attached to a 429 response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitMeta {
    /// Seconds the caller should wait before retrying, when advertised.
    pub retry_after_seconds: Option<u64>,
}

fn finite_seconds(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
}

fn ceil_seconds(seconds: f64) -> u64 {
    seconds.ceil() as u64
}

/// Parse a `Retry-After` header value against the supplied clock.
///
/// Numeric values are ceiling-rounded seconds; HTTP dates resolve to
/// `max(0, ceil((date - now) / 1s))`. Unparsable values yield `None`.
///
/// # Examples
/// ```
/// use backend::outbound::api::rate_limit::parse_retry_after;
/// use chrono::Utc;
///
/// assert_eq!(parse_retry_after("12", Utc::now()), Some(12));
/// assert_eq!(parse_retry_after("1.5", Utc::now()), Some(2));
/// assert_eq!(parse_retry_after("soon", Utc::now()), None);
/// ```
#[must_use]
pub fn parse_retry_after(header_value: &str, now: DateTime<Utc>) -> Option<u64> {
    if header_value.is_empty() {
        return None;
    }

    if let Some(seconds) = finite_seconds(&Value::from(header_value)) {
        return Some(ceil_seconds(seconds));
    }

    let retry_at = DateTime::parse_from_rfc2822(header_value).ok()?;
    let delta_ms = retry_at
        .with_timezone(&Utc)
        .signed_duration_since(now)
        .num_milliseconds();
    if delta_ms <= 0 {
        Some(0)
    } else {
        u64::try_from(delta_ms).ok().map(|ms| ms.div_ceil(1000))
    }
}

/// Pull a `retry_after_seconds` hint out of envelope details.
#[must_use]
pub fn parse_retry_after_from_details(details: Option<&Value>) -> Option<u64> {
    let value = details?.as_object()?.get("retry_after_seconds")?;
    finite_seconds(value).map(ceil_seconds)
}

/// Resolve rate-limit metadata from a response: header first, envelope
/// details as fallback.
#[must_use]
pub fn parse_rate_limit_meta(
    headers: &HeaderMap,
    details: Option<&Value>,
    now: DateTime<Utc>,
) -> RateLimitMeta {
    let from_header = headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| parse_retry_after(value, now));

    RateLimitMeta {
        retry_after_seconds: from_header.or_else(|| parse_retry_after_from_details(details)),
    }
}
