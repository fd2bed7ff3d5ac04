//! Session cookie jar shared between an indexer's requests and responses.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

#[derive(Debug, Default)]
struct JarState {
    cookies: BTreeMap<String, String>,
    expires_at: Option<DateTime<Utc>>,
}

/// A cheaply clonable handle to one indexer session's cookies.
///
/// The handle rides on [`crate::IndexerRequest`]; the dispatch layer sends its
/// cookies and merges the ones the response sets. Parsers that learn about a
/// new session write to it through [`crate::IndexerResponse::cookie_jar`].
/// Two handles are equal when they point at the same jar.
#[derive(Clone, Default)]
pub struct CookieJar {
    inner: Arc<RwLock<JarState>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a jar pre-filled with cookies.
    pub fn with_cookies<I, K, V>(cookies: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let jar = Self::new();
        jar.update(cookies, None);
        jar
    }

    /// Merges cookies into the jar and sets the session expiry.
    pub fn update<I, K, V>(&self, cookies: I, expires_at: Option<DateTime<Utc>>)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut state = self.inner.write();
        for (name, value) in cookies {
            state.cookies.insert(name.into(), value.into());
        }
        if expires_at.is_some() {
            state.expires_at = expires_at;
        }
    }

    /// Drops every cookie.
    pub fn clear(&self) {
        let mut state = self.inner.write();
        state.cookies.clear();
        state.expires_at = None;
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.inner.read().cookies.get(name).cloned()
    }

    /// Snapshot of all cookies.
    pub fn cookies(&self) -> BTreeMap<String, String> {
        self.inner.read().cookies.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().cookies.is_empty()
    }

    /// Whether the session has expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.inner
            .read()
            .expires_at
            .map(|exp| exp <= now)
            .unwrap_or(false)
    }

    /// `Cookie` header value, `None` when empty.
    pub fn header_value(&self) -> Option<String> {
        let state = self.inner.read();
        if state.cookies.is_empty() {
            return None;
        }
        Some(
            state
                .cookies
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

impl PartialEq for CookieJar {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for CookieJar {}

impl fmt::Debug for CookieJar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.read();
        f.debug_struct("CookieJar")
            .field("names", &state.cookies.keys().collect::<Vec<_>>())
            .field("expires_at", &state.expires_at)
            .finish()
    }
}

/// Parses a `Set-Cookie` header value into its name and value.
pub fn parse_set_cookie(header: &str) -> Option<(String, String)> {
    let pair = header.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}
