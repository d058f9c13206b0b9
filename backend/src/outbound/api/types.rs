//! Data transfer types for the domain services.
//!
//! All payloads are camelCase on the wire.

use pagination::{CursorParams, LimitOffsetParams};
use serde::{Deserialize, Serialize};

/// One page of results plus continuation metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResult<T> {
    /// Items in this page.
    pub items: Vec<T>,
    /// Total item count, when the endpoint reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    /// Cursor for the next page, when more results exist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// The signed-in account's profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeProfile {
    /// Account identifier.
    pub id: String,
    /// Contact email.
    pub email: String,
    /// Public display name.
    pub username: String,
}

/// A release found by the catalogue search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    /// Release identifier.
    pub id: String,
    /// Release title.
    pub title: String,
    /// Release year, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
    /// Credited artists.
    pub artists: Vec<String>,
}

/// A saved search the account is watching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchRule {
    /// Rule identifier.
    pub id: String,
    /// Search query the rule matches against.
    pub query: String,
    /// Whether the rule is currently active.
    pub enabled: bool,
    /// Creation time, ISO-8601.
    pub created_at: String,
}

/// A release matched by a watch rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchRelease {
    /// Match identifier.
    pub id: String,
    /// Rule that produced the match.
    pub rule_id: String,
    /// Catalogue identifier of the matched release.
    pub release_id: String,
    /// Release title.
    pub title: String,
    /// Publication time, ISO-8601.
    pub published_at: String,
}

/// A notification delivered to the account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Notification identifier.
    pub id: String,
    /// Notification type tag.
    #[serde(rename = "type")]
    pub kind: String,
    /// Rendered message.
    pub message: String,
    /// When the account read it, if at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<String>,
    /// Creation time, ISO-8601.
    pub created_at: String,
}

/// Lifecycle states of a provider access request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderRequestStatus {
    /// Awaiting review.
    Pending,
    /// Granted.
    Approved,
    /// Declined.
    Rejected,
}

/// A request for access to an upstream provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRequest {
    /// Request identifier.
    pub id: String,
    /// Provider the request targets.
    pub provider: String,
    /// Review status.
    pub status: ProviderRequestStatus,
    /// Creation time, ISO-8601.
    pub created_at: String,
}

/// Delivery states of an outbound notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboundDeliveryStatus {
    /// Waiting to be sent.
    Queued,
    /// Handed to the channel.
    Sent,
    /// The channel rejected it.
    Failed,
}

/// One outbound delivery attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundDelivery {
    /// Delivery identifier.
    pub id: String,
    /// Delivery channel (email, webhook, ...).
    pub channel: String,
    /// Channel-specific destination.
    pub destination: String,
    /// Delivery status.
    pub status: OutboundDeliveryStatus,
    /// Creation time, ISO-8601.
    pub created_at: String,
}

/// Catalogue entity kinds accepted by the release search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseSearchKind {
    /// A concrete pressing.
    Release,
    /// A master grouping of pressings.
    Master,
    /// An artist.
    Artist,
    /// A label.
    Label,
}

impl ReleaseSearchKind {
    /// Wire value used in the `type` query parameter.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Release => "release",
            Self::Master => "master",
            Self::Artist => "artist",
            Self::Label => "label",
        }
    }
}

/// Parameters for the catalogue release search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReleaseSearchParams {
    /// Free-text query.
    pub q: String,
    /// Restrict results to one entity kind.
    pub kind: Option<ReleaseSearchKind>,
    /// Result window.
    pub page: LimitOffsetParams,
}

/// Listing parameters for watch rules.
pub type WatchRulesListParams = LimitOffsetParams;

/// Listing parameters for watched releases.
pub type WatchReleasesListParams = CursorParams;

/// Listing parameters for notifications.
pub type NotificationsListParams = CursorParams;

/// Listing parameters for provider requests.
pub type ProviderRequestsListParams = LimitOffsetParams;

/// Listing parameters for outbound deliveries.
pub type OutboundListParams = CursorParams;
