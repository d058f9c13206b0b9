//! Auth session controller.
//!
//! Decorates an [`HttpTransport`] with the browser-side session policy:
//! bearer injection for API-scoped calls, and session teardown plus a
//! guarded redirect when a response signals that the session ended
//! (reauth-required, logout, account removal). The wrapper is reentrant;
//! the redirect guard is the only shared mutable state and only suppresses
//! duplicate redirects.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode};

use crate::outbound::api::transport::{
    HttpTransport, TransportError, TransportRequest, TransportResponse,
};

use super::store::{clear_auth_session, SessionStore, AUTH_TOKEN_KEY};

/// Route shown after signing out; takes a `reason` query parameter.
pub const SIGNED_OUT_ROUTE: &str = "/signed-out";
/// Route shown after account removal; takes no parameters.
pub const ACCOUNT_REMOVED_ROUTE: &str = "/account-removed";

const API_PATH_PREFIX: &str = "/api/";
const LOGOUT_PATH: &str = "/api/me/logout";
const PROFILE_PATH: &str = "/api/me";
const HARD_DELETE_PATH: &str = "/api/me/hard-delete";

/// Session transitions announced before a redirect fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    /// The account signed out deliberately.
    SignedOut,
    /// The account was removed.
    AccountRemoved,
    /// The backend rejected the session; the account must sign in again.
    ReauthRequired,
}

impl AuthEvent {
    /// Kebab-case name used as the redirect `reason` parameter.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SignedOut => "signed-out",
            Self::AccountRemoved => "account-removed",
            Self::ReauthRequired => "reauth-required",
        }
    }
}

impl std::fmt::Display for AuthEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Navigation side of a session transition.
pub trait RedirectHandler: Send + Sync {
    /// Navigate to the target route. Must not fail the caller.
    fn redirect(&self, target: &str);
}

/// Observer notified of a transition before the redirect is invoked.
pub trait AuthEventSink: Send + Sync {
    /// Receive the transition kind.
    fn dispatch(&self, event: AuthEvent);
}

struct NullEventSink;

impl AuthEventSink for NullEventSink {
    fn dispatch(&self, _event: AuthEvent) {}
}

/// Factory wiring the session policy around a transport.
///
/// `install` consumes the controller and yields the wrapped transport plus a
/// handle whose `teardown` restores the original transport and re-arms the
/// redirect guard.
pub struct AuthSessionController {
    store: Arc<dyn SessionStore>,
    redirect: Arc<dyn RedirectHandler>,
    events: Arc<dyn AuthEventSink>,
}

impl AuthSessionController {
    /// Build a controller over a store and redirect handler.
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, redirect: Arc<dyn RedirectHandler>) -> Self {
        Self {
            store,
            redirect,
            events: Arc::new(NullEventSink),
        }
    }

    /// Attach an observer for session transitions.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn AuthEventSink>) -> Self {
        self.events = events;
        self
    }

    /// Wrap a transport with the session policy.
    #[must_use]
    pub fn install(
        self,
        transport: Arc<dyn HttpTransport>,
    ) -> (Arc<dyn HttpTransport>, AuthSessionHandle) {
        let redirecting = Arc::new(AtomicBool::new(false));
        let wrapped: Arc<dyn HttpTransport> = Arc::new(SessionTransport {
            inner: Arc::clone(&transport),
            store: self.store,
            redirect: self.redirect,
            events: self.events,
            redirecting: Arc::clone(&redirecting),
        });
        (
            wrapped,
            AuthSessionHandle {
                original: transport,
                redirecting,
            },
        )
    }
}

/// Handle restoring the state captured by [`AuthSessionController::install`].
pub struct AuthSessionHandle {
    original: Arc<dyn HttpTransport>,
    redirecting: Arc<AtomicBool>,
}

impl AuthSessionHandle {
    /// Reset the redirect guard and hand back the undecorated transport.
    #[must_use]
    pub fn teardown(self) -> Arc<dyn HttpTransport> {
        self.redirecting.store(false, Ordering::SeqCst);
        self.original
    }
}

struct SessionTransport {
    inner: Arc<dyn HttpTransport>,
    store: Arc<dyn SessionStore>,
    redirect: Arc<dyn RedirectHandler>,
    events: Arc<dyn AuthEventSink>,
    redirecting: Arc<AtomicBool>,
}

impl SessionTransport {
    /// First qualifying response wins; the guard stays set until teardown.
    fn redirect_with_event(&self, event: AuthEvent) {
        if self.redirecting.swap(true, Ordering::SeqCst) {
            return;
        }

        self.events.dispatch(event);
        if event == AuthEvent::AccountRemoved {
            self.redirect.redirect(ACCOUNT_REMOVED_ROUTE);
        } else {
            self.redirect
                .redirect(&format!("{SIGNED_OUT_ROUTE}?reason={event}"));
        }
    }
}

#[async_trait]
impl HttpTransport for SessionTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut request = request;
        let pathname = request.url.path().to_owned();
        let method = request.method.clone();
        let api_scoped = pathname.starts_with(API_PATH_PREFIX);

        if api_scoped && !request.headers.contains_key(AUTHORIZATION) {
            if let Some(token) = self.store.get(AUTH_TOKEN_KEY) {
                if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
                    request.headers.insert(AUTHORIZATION, value);
                }
            }
        }

        let response = self.inner.execute(request).await?;

        if api_scoped
            && (response.status == StatusCode::UNAUTHORIZED
                || response.status == StatusCode::FORBIDDEN)
        {
            clear_auth_session(self.store.as_ref());
            self.redirect_with_event(AuthEvent::ReauthRequired);
            return Ok(response);
        }

        if response.status.is_success() && method == Method::POST && pathname == LOGOUT_PATH {
            clear_auth_session(self.store.as_ref());
            self.redirect_with_event(AuthEvent::SignedOut);
        }

        if response.status.is_success()
            && method == Method::DELETE
            && (pathname == PROFILE_PATH || pathname == HARD_DELETE_PATH)
        {
            clear_auth_session(self.store.as_ref());
            self.redirect_with_event(AuthEvent::AccountRemoved);
        }

        Ok(response)
    }
}
