//! Recursive redaction of sensitive fields in log payloads.
//!
//! Keys are judged by a fixed rule set: an exact lowercase match, an exact
//! match after stripping separators, an `authorization` prefix, or a
//! sensitive suffix. Keys whose separator-stripped form starts with `non`
//! (e.g. `nonSecret`) are exempt from the suffix rule only.

use serde_json::{Map, Value};

/// Placeholder substituted for the value of any sensitive key.
pub const REDACTED_VALUE: &str = "[REDACTED]";

/// Placeholder substituted for values nested beyond [`MAX_DEPTH`].
///
/// JSON trees cannot contain reference cycles, so runaway nesting is the
/// only way a payload could recurse without bound.
pub const CIRCULAR_VALUE: &str = "[Circular]";

/// Nesting depth beyond which values are replaced with [`CIRCULAR_VALUE`].
pub const MAX_DEPTH: usize = 64;

const SENSITIVE_KEYS: [&str; 6] = [
    "authorization",
    "cookie",
    "token",
    "password",
    "secret",
    "set-cookie",
];
const SENSITIVE_EXACT_NORMALIZED_KEYS: [&str; 3] = ["authorization", "cookie", "setcookie"];
const SENSITIVE_SUFFIX_PATTERNS: [&str; 4] = ["token", "secret", "password", "apikey"];

fn normalize_key(key: &str) -> String {
    key.to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .collect()
}

/// Whether a payload key's value must be replaced with [`REDACTED_VALUE`].
///
/// # Examples
/// ```
/// use backend::logging::redact::is_sensitive_key;
///
/// assert!(is_sensitive_key("access_token"));
/// assert!(is_sensitive_key("Authorization-Header"));
/// assert!(!is_sensitive_key("nonSecret"));
/// ```
#[must_use]
pub fn is_sensitive_key(key: &str) -> bool {
    let lowercase = key.to_lowercase();
    if SENSITIVE_KEYS.contains(&lowercase.as_str()) {
        return true;
    }

    let normalized = normalize_key(key);
    if SENSITIVE_EXACT_NORMALIZED_KEYS.contains(&normalized.as_str()) {
        return true;
    }

    if normalized.starts_with("authorization") {
        return true;
    }

    if normalized.starts_with("non") {
        return false;
    }

    SENSITIVE_SUFFIX_PATTERNS
        .iter()
        .any(|pattern| normalized.ends_with(pattern))
}

/// Walk a payload tree and redact every sensitive key, at any depth,
/// including inside arrays.
#[must_use]
pub fn sanitize(value: &Value) -> Value {
    sanitize_at_depth(value, 0)
}

fn sanitize_at_depth(value: &Value, depth: usize) -> Value {
    if depth > MAX_DEPTH {
        return Value::from(CIRCULAR_VALUE);
    }

    match value {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| sanitize_at_depth(item, depth + 1))
                .collect(),
        ),
        Value::Object(entries) => {
            let mut sanitized = Map::with_capacity(entries.len());
            for (key, entry) in entries {
                if is_sensitive_key(key) {
                    sanitized.insert(key.clone(), Value::from(REDACTED_VALUE));
                } else {
                    sanitized.insert(key.clone(), sanitize_at_depth(entry, depth + 1));
                }
            }
            Value::Object(sanitized)
        }
        primitive => primitive.clone(),
    }
}
