//! Inbound indexer responses.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

use crate::request::IndexerRequest;
use crate::session::CookieJar;
use crate::Result;

/// Raw answer of one dispatched request.
///
/// The body is kept as text; parsers decide how to read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerResponse {
    status: u16,
    headers: BTreeMap<String, String>,
    content: String,
    cookies: BTreeMap<String, String>,
    request: IndexerRequest,
    from_cache: bool,
    received_at: Option<DateTime<Utc>>,
}

impl IndexerResponse {
    pub fn new(request: IndexerRequest, status: u16, content: impl Into<String>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            content: content.into(),
            cookies: BTreeMap::new(),
            request,
            from_cache: false,
            received_at: None,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Cookies the remote set on this response.
    pub fn cookies(&self) -> &BTreeMap<String, String> {
        &self.cookies
    }

    /// The request this response answers.
    pub fn request(&self) -> &IndexerRequest {
        &self.request
    }

    pub fn from_cache(&self) -> bool {
        self.from_cache
    }

    /// When the dispatch layer received the response; cached copies keep it.
    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        self.received_at
    }

    /// The instant relative and missing dates are resolved against.
    ///
    /// The `Date` header when it parses, otherwise the receive stamp, otherwise
    /// the Unix epoch. Depends only on the response, so re-parsing it yields
    /// the same dates.
    pub fn reference_time(&self) -> DateTime<Utc> {
        self.header("date")
            .and_then(|d| DateTime::parse_from_rfc2822(d.trim()).ok())
            .map(|d| d.with_timezone(&Utc))
            .or(self.received_at)
            .unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// Session jar of the originating request, if it carried one.
    pub fn cookie_jar(&self) -> Option<&CookieJar> {
        self.request.cookie_jar()
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.content)?)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        for (name, value) in headers {
            self.headers.insert(name.to_ascii_lowercase(), value);
        }
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_cookies<I, K, V>(mut self, cookies: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in cookies {
            self.cookies.insert(name.into(), value.into());
        }
        self
    }

    /// Re-pairs the response with another request.
    pub fn with_request(mut self, request: IndexerRequest) -> Self {
        self.request = request;
        self
    }

    pub fn with_from_cache(mut self, from_cache: bool) -> Self {
        self.from_cache = from_cache;
        self
    }

    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = Some(received_at);
        self
    }
}
