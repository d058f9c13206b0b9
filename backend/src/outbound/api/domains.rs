//! Typed domain services layered over the API client.
//!
//! Each service owns one resource family and translates typed parameters
//! into paths and query strings; pagination parameters are validated before
//! any request is issued.

use pagination::{
    append_cursor_pagination, append_limit_offset, CursorParams, LimitOffsetParams, QueryParams,
};
use serde_json::{json, Value};

use super::client::{ApiClient, ClientError, RequestOptions};
use super::types::{
    MeProfile, Notification, OutboundDelivery, PaginatedResult, ProviderRequest, Release,
    ReleaseSearchParams, WatchRelease, WatchRule,
};
use reqwest::Method;

/// Entry point bundling all domain services over one client.
#[derive(Clone)]
pub struct DomainServices {
    client: ApiClient,
}

impl DomainServices {
    /// Bundle services over the given client.
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Account profile and session operations.
    #[must_use]
    pub fn me(&self) -> MeService<'_> {
        MeService {
            client: &self.client,
        }
    }

    /// Catalogue release search.
    #[must_use]
    pub fn releases(&self) -> ReleasesService<'_> {
        ReleasesService {
            client: &self.client,
        }
    }

    /// Saved watch rules.
    #[must_use]
    pub fn watch_rules(&self) -> WatchRulesService<'_> {
        WatchRulesService {
            client: &self.client,
        }
    }

    /// Releases matched by watch rules.
    #[must_use]
    pub fn watch_releases(&self) -> WatchReleasesService<'_> {
        WatchReleasesService {
            client: &self.client,
        }
    }

    /// Account notifications.
    #[must_use]
    pub fn notifications(&self) -> NotificationsService<'_> {
        NotificationsService {
            client: &self.client,
        }
    }

    /// Provider access requests.
    #[must_use]
    pub fn provider_requests(&self) -> ProviderRequestsService<'_> {
        ProviderRequestsService {
            client: &self.client,
        }
    }

    /// Outbound notification deliveries.
    #[must_use]
    pub fn outbound(&self) -> OutboundService<'_> {
        OutboundService {
            client: &self.client,
        }
    }
}

fn expect_body<T>(parsed: Option<T>) -> Result<T, ClientError> {
    parsed.ok_or(ClientError::MissingBody)
}

/// Account profile and session operations.
pub struct MeService<'a> {
    client: &'a ApiClient,
}

impl MeService<'_> {
    /// Fetch the signed-in profile.
    ///
    /// # Errors
    /// Propagates [`ClientError`].
    pub async fn profile(&self) -> Result<MeProfile, ClientError> {
        expect_body(
            self.client
                .request("/me", RequestOptions::default(), None)
                .await?,
        )
    }

    /// End the current session.
    ///
    /// # Errors
    /// Propagates [`ClientError`].
    pub async fn logout(&self) -> Result<(), ClientError> {
        self.client
            .request::<Value>("/me/logout", RequestOptions::method(Method::POST), None)
            .await
            .map(|_| ())
    }

    /// Remove the account.
    ///
    /// # Errors
    /// Propagates [`ClientError`].
    pub async fn delete_account(&self) -> Result<(), ClientError> {
        self.client
            .request::<Value>("/me", RequestOptions::method(Method::DELETE), None)
            .await
            .map(|_| ())
    }
}

/// Catalogue release search.
pub struct ReleasesService<'a> {
    client: &'a ApiClient,
}

impl ReleasesService<'_> {
    /// Search the catalogue for releases.
    ///
    /// # Errors
    /// Fails before any network call when the pagination window is invalid.
    pub async fn search(
        &self,
        params: &ReleaseSearchParams,
    ) -> Result<PaginatedResult<Release>, ClientError> {
        let mut query = QueryParams::new();
        append_limit_offset(&mut query, &params.page)?;
        query.set("q", params.q.clone());
        if let Some(kind) = params.kind {
            query.set("type", kind.as_str());
        }

        expect_body(
            self.client
                .request("/releases/search", RequestOptions::default(), Some(&query))
                .await?,
        )
    }
}

/// Saved watch rules.
pub struct WatchRulesService<'a> {
    client: &'a ApiClient,
}

impl WatchRulesService<'_> {
    /// List watch rules in a limit/offset window.
    ///
    /// # Errors
    /// Fails before any network call when the pagination window is invalid.
    pub async fn list(
        &self,
        params: &LimitOffsetParams,
    ) -> Result<PaginatedResult<WatchRule>, ClientError> {
        let mut query = QueryParams::new();
        append_limit_offset(&mut query, params)?;
        expect_body(
            self.client
                .request("/watch-rules", RequestOptions::default(), Some(&query))
                .await?,
        )
    }

    /// Create a watch rule.
    ///
    /// # Errors
    /// Propagates [`ClientError`].
    pub async fn create(&self, query: &str, enabled: bool) -> Result<WatchRule, ClientError> {
        expect_body(
            self.client
                .request(
                    "/watch-rules",
                    RequestOptions::post(json!({ "query": query, "enabled": enabled })),
                    None,
                )
                .await?,
        )
    }

    /// Delete a watch rule.
    ///
    /// # Errors
    /// Propagates [`ClientError`].
    pub async fn remove(&self, watch_rule_id: &str) -> Result<(), ClientError> {
        let path = format!("/watch-rules/{}", encode_segment(watch_rule_id));
        self.client
            .request::<Value>(&path, RequestOptions::method(Method::DELETE), None)
            .await
            .map(|_| ())
    }
}

/// Releases matched by watch rules.
pub struct WatchReleasesService<'a> {
    client: &'a ApiClient,
}

impl WatchReleasesService<'_> {
    /// List matched releases along a cursor.
    ///
    /// # Errors
    /// Fails before any network call when the cursor parameters are invalid.
    pub async fn list(
        &self,
        params: &CursorParams,
    ) -> Result<PaginatedResult<WatchRelease>, ClientError> {
        let mut query = QueryParams::new();
        append_cursor_pagination(&mut query, params)?;
        expect_body(
            self.client
                .request("/watch-releases", RequestOptions::default(), Some(&query))
                .await?,
        )
    }
}

/// Account notifications.
pub struct NotificationsService<'a> {
    client: &'a ApiClient,
}

impl NotificationsService<'_> {
    /// List notifications along a cursor.
    ///
    /// # Errors
    /// Fails before any network call when the cursor parameters are invalid.
    pub async fn list(
        &self,
        params: &CursorParams,
    ) -> Result<PaginatedResult<Notification>, ClientError> {
        let mut query = QueryParams::new();
        append_cursor_pagination(&mut query, params)?;
        expect_body(
            self.client
                .request("/notifications", RequestOptions::default(), Some(&query))
                .await?,
        )
    }

    /// Mark one notification as read.
    ///
    /// # Errors
    /// Propagates [`ClientError`].
    pub async fn mark_read(&self, notification_id: &str) -> Result<(), ClientError> {
        let path = format!("/notifications/{}/read", encode_segment(notification_id));
        self.client
            .request::<Value>(&path, RequestOptions::method(Method::POST), None)
            .await
            .map(|_| ())
    }
}

/// Provider access requests.
pub struct ProviderRequestsService<'a> {
    client: &'a ApiClient,
}

impl ProviderRequestsService<'_> {
    /// List provider requests in a limit/offset window.
    ///
    /// # Errors
    /// Fails before any network call when the pagination window is invalid.
    pub async fn list(
        &self,
        params: &LimitOffsetParams,
    ) -> Result<PaginatedResult<ProviderRequest>, ClientError> {
        let mut query = QueryParams::new();
        append_limit_offset(&mut query, params)?;
        expect_body(
            self.client
                .request("/provider-requests", RequestOptions::default(), Some(&query))
                .await?,
        )
    }

    /// Request access to a provider.
    ///
    /// # Errors
    /// Propagates [`ClientError`].
    pub async fn create(&self, provider: &str) -> Result<ProviderRequest, ClientError> {
        expect_body(
            self.client
                .request(
                    "/provider-requests",
                    RequestOptions::post(json!({ "provider": provider })),
                    None,
                )
                .await?,
        )
    }
}

/// Outbound notification deliveries.
pub struct OutboundService<'a> {
    client: &'a ApiClient,
}

impl OutboundService<'_> {
    /// List deliveries along a cursor.
    ///
    /// # Errors
    /// Fails before any network call when the cursor parameters are invalid.
    pub async fn list(
        &self,
        params: &CursorParams,
    ) -> Result<PaginatedResult<OutboundDelivery>, ClientError> {
        let mut query = QueryParams::new();
        append_cursor_pagination(&mut query, params)?;
        expect_body(
            self.client
                .request("/outbound", RequestOptions::default(), Some(&query))
                .await?,
        )
    }
}

/// Percent-encode a path segment so resource ids cannot escape their slot.
fn encode_segment(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogLevel, Logger};
    use crate::outbound::api::transport::HttpTransport;
    use crate::test_support::{json_response, CaptureSink, ScriptedTransport};
    use pagination::PaginationError;
    use std::sync::Arc;
    use url::Url;

    fn services(transport: &Arc<ScriptedTransport>) -> DomainServices {
        let sink = CaptureSink::new();
        let logger = Logger::with_sink(LogLevel::Error, Box::new(sink));
        let url = Url::parse("https://api.example.com/v1").expect("valid base url");
        let client = ApiClient::new(url, logger)
            .with_transport(Arc::clone(transport) as Arc<dyn HttpTransport>);
        DomainServices::new(client)
    }

    #[tokio::test]
    async fn profile_decodes_the_me_payload() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_response(Ok(json_response(
            200,
            &serde_json::json!({ "id": "u-1", "email": "ada@example.com", "username": "ada" }),
        )));

        let profile = services(&transport)
            .me()
            .profile()
            .await
            .expect("profile decodes");
        assert_eq!(profile.username, "ada");

        let sent = transport.requests().remove(0);
        assert_eq!(sent.url.as_str(), "https://api.example.com/v1/me");
    }

    #[tokio::test]
    async fn search_encodes_pagination_query_and_kind() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_response(Ok(json_response(
            200,
            &serde_json::json!({ "items": [], "total": 0 }),
        )));

        let params = ReleaseSearchParams {
            q: "blue train".to_owned(),
            kind: Some(crate::outbound::api::types::ReleaseSearchKind::Release),
            page: LimitOffsetParams {
                limit: Some(25),
                offset: Some(10),
            },
        };
        services(&transport)
            .releases()
            .search(&params)
            .await
            .expect("search succeeds");

        let sent = transport.requests().remove(0);
        assert_eq!(
            sent.url.as_str(),
            "https://api.example.com/v1/releases/search?limit=25&offset=10&q=blue+train&type=release"
        );
    }

    #[tokio::test]
    async fn invalid_pagination_fails_before_any_request() {
        let transport = Arc::new(ScriptedTransport::new());

        let error = services(&transport)
            .watch_rules()
            .list(&LimitOffsetParams {
                limit: Some(0),
                offset: None,
            })
            .await
            .expect_err("limit 0 must fail");

        assert!(matches!(
            error,
            ClientError::Pagination(PaginationError::LimitOutOfRange { max_limit: 100 })
        ));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn cursor_listing_encodes_cursor_then_limit() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_response(Ok(json_response(
            200,
            &serde_json::json!({ "items": [], "nextCursor": "def" }),
        )));

        let page = services(&transport)
            .notifications()
            .list(&CursorParams {
                cursor: Some("abc".to_owned()),
                limit: Some(5),
            })
            .await
            .expect("listing succeeds");
        assert_eq!(page.next_cursor.as_deref(), Some("def"));

        let sent = transport.requests().remove(0);
        assert_eq!(
            sent.url.as_str(),
            "https://api.example.com/v1/notifications?cursor=abc&limit=5"
        );
    }

    #[tokio::test]
    async fn remove_escapes_resource_ids() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_response(Ok(crate::test_support::empty_response(204)));

        services(&transport)
            .watch_rules()
            .remove("rule/one")
            .await
            .expect("delete succeeds");

        let sent = transport.requests().remove(0);
        assert_eq!(
            sent.url.as_str(),
            "https://api.example.com/v1/watch-rules/rule%2Fone"
        );
        assert_eq!(sent.method, Method::DELETE);
    }

    #[tokio::test]
    async fn body_bearing_endpoints_reject_empty_responses() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_response(Ok(crate::test_support::empty_response(204)));

        let error = services(&transport)
            .me()
            .profile()
            .await
            .expect_err("a 204 profile response is malformed");
        assert!(matches!(error, ClientError::MissingBody));
    }
}
