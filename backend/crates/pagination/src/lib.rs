//! Pagination parameter validation and query-string encoding.
//!
//! Endpoints paginate in one of two styles: limit/offset windows or opaque
//! cursors. Both are validated up front so a bad parameter fails before any
//! request is issued, then encoded into a [`QueryParams`] container.

use serde::{Deserialize, Serialize};

/// Upper bound applied to `limit` when callers do not supply their own.
pub const DEFAULT_MAX_LIMIT: u32 = 100;

/// Validation failures raised before any parameter is encoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaginationError {
    /// `limit` fell outside the permitted `1..=max_limit` window.
    #[error("\"limit\" must be an integer between 1 and {max_limit}")]
    LimitOutOfRange {
        /// Inclusive upper bound that was in force.
        max_limit: u32,
    },
    /// `cursor` was present but blank after trimming.
    #[error("\"cursor\" must not be empty")]
    EmptyCursor,
}

/// Window-style pagination parameters.
///
/// `offset` is unsigned, so the non-negativity half of the contract is
/// enforced by the type; range checks on `limit` remain explicit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitOffsetParams {
    /// Maximum number of items to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Number of items to skip from the start of the collection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

/// Cursor-style pagination parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorParams {
    /// Opaque continuation token returned by a previous page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    /// Maximum number of items to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// Ordered query-parameter container with `set`-replaces-by-key semantics.
///
/// # Examples
/// ```
/// use pagination::QueryParams;
///
/// let mut params = QueryParams::new();
/// params.set("limit", "25");
/// params.set("offset", "10");
/// assert_eq!(params.to_query_string(), "limit=25&offset=10");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Create an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`, replacing any existing entry for the same key
    /// while keeping its original position.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(existing) = self.pairs.iter_mut().find(|(k, _)| *k == key) {
            existing.1 = value;
        } else {
            self.pairs.push((key, value));
        }
    }

    /// Look up the current value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether no parameters have been set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Number of parameters currently set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Percent-encode the parameters into `key=value&...` form.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .finish()
    }
}

impl std::fmt::Display for QueryParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_query_string())
    }
}

/// Check `limit` against the `1..=max_limit` window.
///
/// # Errors
/// Returns [`PaginationError::LimitOutOfRange`] when `limit` is present and
/// outside the window.
pub fn validate_limit(limit: Option<u32>, max_limit: u32) -> Result<(), PaginationError> {
    match limit {
        Some(value) if value < 1 || value > max_limit => {
            Err(PaginationError::LimitOutOfRange { max_limit })
        }
        _ => Ok(()),
    }
}

/// Check that `cursor`, when present, is not blank after trimming.
///
/// # Errors
/// Returns [`PaginationError::EmptyCursor`] for blank cursors.
pub fn validate_cursor(cursor: Option<&str>) -> Result<(), PaginationError> {
    match cursor {
        Some(value) if value.trim().is_empty() => Err(PaginationError::EmptyCursor),
        _ => Ok(()),
    }
}

/// Validate then encode limit/offset parameters with the default limit cap.
///
/// # Errors
/// Propagates validation failures; `params` is untouched on error.
///
/// # Examples
/// ```
/// use pagination::{append_limit_offset, LimitOffsetParams, QueryParams};
///
/// let mut params = QueryParams::new();
/// append_limit_offset(
///     &mut params,
///     &LimitOffsetParams { limit: Some(25), offset: Some(10) },
/// )?;
/// assert_eq!(params.to_query_string(), "limit=25&offset=10");
/// # Ok::<(), pagination::PaginationError>(())
/// ```
pub fn append_limit_offset(
    params: &mut QueryParams,
    options: &LimitOffsetParams,
) -> Result<(), PaginationError> {
    append_limit_offset_with_max(params, options, DEFAULT_MAX_LIMIT)
}

/// Validate then encode limit/offset parameters against an explicit cap.
///
/// Validation happens before any `set` call, so a failure leaves `params`
/// exactly as it was.
///
/// # Errors
/// Returns [`PaginationError::LimitOutOfRange`] when `limit` is out of range.
pub fn append_limit_offset_with_max(
    params: &mut QueryParams,
    options: &LimitOffsetParams,
    max_limit: u32,
) -> Result<(), PaginationError> {
    validate_limit(options.limit, max_limit)?;

    if let Some(limit) = options.limit {
        params.set("limit", limit.to_string());
    }
    if let Some(offset) = options.offset {
        params.set("offset", offset.to_string());
    }
    Ok(())
}

/// Validate then encode cursor parameters with the default limit cap.
///
/// # Errors
/// Propagates validation failures; `params` is untouched on error.
pub fn append_cursor_pagination(
    params: &mut QueryParams,
    options: &CursorParams,
) -> Result<(), PaginationError> {
    append_cursor_pagination_with_max(params, options, DEFAULT_MAX_LIMIT)
}

/// Validate then encode cursor parameters against an explicit cap.
///
/// Cursor comes first in the encoded output, matching the order pages link
/// themselves together.
///
/// # Errors
/// Returns [`PaginationError::LimitOutOfRange`] or
/// [`PaginationError::EmptyCursor`] before any parameter is written.
pub fn append_cursor_pagination_with_max(
    params: &mut QueryParams,
    options: &CursorParams,
    max_limit: u32,
) -> Result<(), PaginationError> {
    validate_limit(options.limit, max_limit)?;
    validate_cursor(options.cursor.as_deref())?;

    if let Some(cursor) = &options.cursor {
        params.set("cursor", cursor.clone());
    }
    if let Some(limit) = options.limit {
        params.set("limit", limit.to_string());
    }
    Ok(())
}
