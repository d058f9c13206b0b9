//! Browser-side auth session management.
//!
//! Purpose: wrap an HTTP-call capability with bearer injection and the
//! sign-out/reauth/account-removal transitions, over an explicit
//! install/teardown lifecycle.

pub mod controller;
pub mod store;

pub use controller::{
    AuthEvent, AuthEventSink, AuthSessionController, AuthSessionHandle, RedirectHandler,
    ACCOUNT_REMOVED_ROUTE, SIGNED_OUT_ROUTE,
};
pub use store::{
    clear_auth_session, MemorySessionStore, SessionStore, AUTH_SESSION_KEY, AUTH_TOKEN_KEY,
};
