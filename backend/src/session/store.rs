//! Session state storage port.
//!
//! The browser's persistent key-value store owns the bearer token and an
//! opaque session marker; this port gives the controller the two operations
//! it needs and keeps the real storage behind the seam.

use std::collections::HashMap;
use std::sync::Mutex;

/// Storage key holding the bearer token.
pub const AUTH_TOKEN_KEY: &str = "discwatch.auth.jwt";
/// Storage key holding the opaque session marker.
pub const AUTH_SESSION_KEY: &str = "discwatch.auth.session";

/// Key-value storage holding session state.
///
/// Reads and removals are best-effort: implementations must not fail the
/// caller. Writes happen at sign-in, outside this layer.
pub trait SessionStore: Send + Sync {
    /// Read a stored value.
    fn get(&self, key: &str) -> Option<String>;
    /// Remove a stored value, if present.
    fn remove(&self, key: &str);
}

/// Remove both session keys together.
pub fn clear_auth_session(store: &dyn SessionStore) {
    store.remove(AUTH_TOKEN_KEY);
    store.remove(AUTH_SESSION_KEY);
}

/// In-process store mirroring browser local storage semantics.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, replacing any previous one.
    pub fn insert(&self, key: &str, value: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_owned(), value.to_owned());
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn remove(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }
}
