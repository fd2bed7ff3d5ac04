//! Outbound indexer requests and the tiered request chain.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use reqwest::Method;
use url::Url;

use crate::session::CookieJar;
use crate::Result;

/// Content type an indexer is expected to answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HttpAccept {
    #[default]
    Html,
    Json,
    Xml,
    Rss,
    Any,
}

impl HttpAccept {
    /// Value of the `Accept` header.
    pub fn header_value(&self) -> &'static str {
        match self {
            HttpAccept::Html => "text/html",
            HttpAccept::Json => "application/json",
            HttpAccept::Xml => "application/xml",
            HttpAccept::Rss => "application/rss+xml, text/rss+xml, text/xml",
            HttpAccept::Any => "*/*",
        }
    }
}

/// Cache policy of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Use the dispatch layer's TTL.
    #[default]
    Default,
    /// Cache for this long.
    Ttl(Duration),
    /// Never read from nor write to the cache.
    Bypass,
}

/// One outbound call.
///
/// Built once by a request generator, then only transformed by consuming
/// `with_*` methods that return a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerRequest {
    url: Url,
    method: Method,
    accept: HttpAccept,
    headers: BTreeMap<String, String>,
    body: Option<String>,
    cookie_jar: Option<CookieJar>,
    proxy_url: Option<String>,
    cache: CachePolicy,
    suppress_http_errors: bool,
}

impl IndexerRequest {
    /// Creates a GET request for a fully built URL.
    pub fn get(url: Url, accept: HttpAccept) -> Self {
        Self {
            url,
            method: Method::GET,
            accept,
            headers: BTreeMap::new(),
            body: None,
            cookie_jar: None,
            proxy_url: None,
            cache: CachePolicy::Default,
            suppress_http_errors: false,
        }
    }

    /// Parses `url` and creates a GET request.
    pub fn parse(url: &str, accept: HttpAccept) -> Result<Self> {
        Ok(Self::get(Url::parse(url)?, accept))
    }

    /// Starts a builder for `base` with query parameters appended in order.
    pub fn builder(base: &str) -> IndexerRequestBuilder {
        IndexerRequestBuilder::new(base)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn accept(&self) -> HttpAccept {
        self.accept
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn cookie_jar(&self) -> Option<&CookieJar> {
        self.cookie_jar.as_ref()
    }

    /// Gateway proxy the request must be routed through.
    pub fn proxy_url(&self) -> Option<&str> {
        self.proxy_url.as_deref()
    }

    pub fn cache_policy(&self) -> CachePolicy {
        self.cache
    }

    /// Whether non-2xx answers are handed back instead of failing.
    pub fn suppresses_http_errors(&self) -> bool {
        self.suppress_http_errors
    }

    /// Value of a query parameter, if present.
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    /// Number of times a query parameter occurs.
    pub fn query_param_count(&self, name: &str) -> usize {
        self.url.query_pairs().filter(|(k, _)| k == name).count()
    }

    pub fn with_url(mut self, url: Url) -> Self {
        self.url = url;
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Sets a body (and its content type).
    pub fn with_body(mut self, content_type: &str, body: impl Into<String>) -> Self {
        self.headers
            .insert("content-type".to_string(), content_type.to_string());
        self.body = Some(body.into());
        self
    }

    pub fn with_cookie_jar(mut self, jar: CookieJar) -> Self {
        self.cookie_jar = Some(jar);
        self
    }

    pub fn with_proxy_url(mut self, proxy_url: impl Into<String>) -> Self {
        self.proxy_url = Some(proxy_url.into());
        self
    }

    pub fn with_cache_policy(mut self, cache: CachePolicy) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_suppressed_http_errors(mut self) -> Self {
        self.suppress_http_errors = true;
        self
    }

    /// Normalized signature used as the response cache key.
    ///
    /// Query pairs are sorted so parameter order does not split the cache.
    pub fn cache_key(&self) -> String {
        let mut pairs: Vec<(String, String)> = self
            .url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        pairs.sort();

        let mut url = self.url.clone();
        url.set_fragment(None);
        url.set_query(None);

        let mut key = format!("{} {}", self.method, url);
        if !pairs.is_empty() {
            let query = pairs
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            key.push('?');
            key.push_str(&query);
        }
        if let Some(proxy) = &self.proxy_url {
            key.push_str(" via ");
            key.push_str(proxy);
        }
        if let Some(body) = &self.body {
            key.push('\n');
            key.push_str(body);
        }
        key
    }

    /// Rate-limit key when no indexer identity is known.
    pub fn host_key(&self) -> String {
        format!("host:{}", self.url.host_str().unwrap_or_default())
    }
}

impl fmt::Display for IndexerRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Builds a request URL from a base and ordered query parameters.
#[derive(Debug, Clone)]
pub struct IndexerRequestBuilder {
    base: String,
    resource: Option<String>,
    params: Vec<(String, String)>,
    accept: HttpAccept,
}

impl IndexerRequestBuilder {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            resource: None,
            params: Vec::new(),
            accept: HttpAccept::Html,
        }
    }

    /// Appends a path below the base URL.
    pub fn resource(mut self, resource: &str) -> Self {
        self.resource = Some(resource.trim_start_matches('/').to_string());
        self
    }

    pub fn accept(mut self, accept: HttpAccept) -> Self {
        self.accept = accept;
        self
    }

    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    /// Appends the parameter only when a value is present and non-empty.
    pub fn param_opt<T: ToString>(self, key: &str, value: Option<T>) -> Self {
        match value.map(|v| v.to_string()).filter(|v| !v.is_empty()) {
            Some(v) => self.param(key, v),
            None => self,
        }
    }

    pub fn build(self) -> Result<IndexerRequest> {
        let mut url = match &self.resource {
            Some(resource) => format!("{}/{}", self.base, resource),
            None => format!("{}/", self.base),
        };
        if !self.params.is_empty() {
            let query = self
                .params
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            url.push('?');
            url.push_str(&query);
        }
        IndexerRequest::parse(&url, self.accept)
    }
}

/// One tier: an ordered, finite run of page requests.
///
/// Consumed by iteration; once drained it cannot be restarted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestTier {
    requests: Vec<IndexerRequest>,
}

impl RequestTier {
    pub fn new(requests: Vec<IndexerRequest>) -> Self {
        Self { requests }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Borrowing view, for inspection.
    pub fn requests(&self) -> &[IndexerRequest] {
        &self.requests
    }
}

impl IntoIterator for RequestTier {
    type Item = IndexerRequest;
    type IntoIter = std::vec::IntoIter<IndexerRequest>;

    fn into_iter(self) -> Self::IntoIter {
        self.requests.into_iter()
    }
}

/// Tiers of alternative query forms, tried in declared order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerPageableRequestChain {
    tiers: Vec<RequestTier>,
}

impl Default for IndexerPageableRequestChain {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexerPageableRequestChain {
    pub fn new() -> Self {
        Self {
            tiers: vec![RequestTier::default()],
        }
    }

    /// Appends requests to the current tier.
    pub fn add<I: IntoIterator<Item = IndexerRequest>>(&mut self, requests: I) {
        if let Some(tier) = self.tiers.last_mut() {
            tier.requests.extend(requests);
        }
    }

    /// Starts a new tier with the given requests.
    ///
    /// An empty current tier is reused rather than left behind.
    pub fn add_tier<I: IntoIterator<Item = IndexerRequest>>(&mut self, requests: I) {
        if self.tiers.last().map(|t| !t.is_empty()).unwrap_or(true) {
            self.tiers.push(RequestTier::default());
        }
        self.add(requests);
    }

    /// Non-empty tiers in order.
    pub fn tiers(&self) -> impl Iterator<Item = &RequestTier> {
        self.tiers.iter().filter(|t| !t.is_empty())
    }

    pub fn tier_count(&self) -> usize {
        self.tiers().count()
    }

    pub fn is_empty(&self) -> bool {
        self.tier_count() == 0
    }

    /// All requests across tiers, in order.
    pub fn requests(&self) -> impl Iterator<Item = &IndexerRequest> {
        self.tiers.iter().flat_map(|t| t.requests.iter())
    }

    /// Consumes the chain into its non-empty tiers.
    pub fn into_tiers(self) -> Vec<RequestTier> {
        self.tiers.into_iter().filter(|t| !t.is_empty()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(url: &str) -> IndexerRequest {
        IndexerRequest::parse(url, HttpAccept::Html).unwrap()
    }

    #[test]
    fn test_builder_encodes_params_in_order() {
        let request = IndexerRequest::builder("https://example.com/")
            .resource("/api")
            .accept(HttpAccept::Json)
            .param("cmd", "search")
            .param("q", "the matrix")
            .param_opt("cat", None::<String>)
            .param_opt("imdbid", Some("tt0133093"))
            .build()
            .unwrap();

        assert_eq!(
            request.url().as_str(),
            "https://example.com/api?cmd=search&q=the%20matrix&imdbid=tt0133093"
        );
        assert_eq!(request.accept(), HttpAccept::Json);
        assert_eq!(request.query_param("q").as_deref(), Some("the matrix"));
        assert_eq!(request.query_param_count("cmd"), 1);
        assert!(request.query_param("cat").is_none());
    }

    #[test]
    fn test_builder_without_resource() {
        let request = IndexerRequest::builder("https://binsearch.info")
            .param("q", "x")
            .build()
            .unwrap();
        assert_eq!(request.url().as_str(), "https://binsearch.info/?q=x");
    }

    #[test]
    fn test_builder_rejects_bad_base() {
        assert!(IndexerRequest::builder("not a url").build().is_err());
    }

    #[test]
    fn test_cache_key_ignores_param_order() {
        let a = req("https://example.com/api?b=2&a=1");
        let b = req("https://example.com/api?a=1&b=2");
        assert_eq!(a.cache_key(), b.cache_key());
        assert_eq!(a.cache_key(), "GET https://example.com/api?a=1&b=2");
    }

    #[test]
    fn test_cache_key_includes_body_and_method() {
        let a = req("https://example.com/v1");
        let b = req("https://example.com/v1")
            .with_method(Method::POST)
            .with_body("application/json", "{\"cmd\":\"request.get\"}");
        assert_ne!(a.cache_key(), b.cache_key());
        assert!(b.cache_key().starts_with("POST https://example.com/v1"));
        assert!(b.cache_key().ends_with("{\"cmd\":\"request.get\"}"));
    }

    #[test]
    fn test_with_header_lowercases() {
        let request = req("https://example.com").with_header("X-Api-Key", "abc");
        assert_eq!(request.headers().get("x-api-key").map(String::as_str), Some("abc"));
    }

    #[test]
    fn test_host_key() {
        assert_eq!(req("https://binsearch.info/?q=x").host_key(), "host:binsearch.info");
    }

    #[test]
    fn test_chain_tiers_preserve_order() {
        let mut chain = IndexerPageableRequestChain::new();
        assert!(chain.is_empty());

        chain.add(vec![req("https://a.test/1"), req("https://a.test/2")]);
        chain.add_tier(vec![req("https://a.test/3")]);

        assert_eq!(chain.tier_count(), 2);
        let urls: Vec<_> = chain.requests().map(|r| r.url().to_string()).collect();
        assert_eq!(urls, vec!["https://a.test/1", "https://a.test/2", "https://a.test/3"]);

        let tiers = chain.into_tiers();
        assert_eq!(tiers[0].len(), 2);
        assert_eq!(tiers[1].len(), 1);
    }

    #[test]
    fn test_chain_add_tier_reuses_empty_tier() {
        let mut chain = IndexerPageableRequestChain::new();
        chain.add_tier(vec![req("https://a.test/1")]);
        assert_eq!(chain.tier_count(), 1);
        assert_eq!(chain.tiers.len(), 1);
    }

    #[test]
    fn test_tier_is_consumed_by_iteration() {
        let tier = RequestTier::new(vec![req("https://a.test/1"), req("https://a.test/2")]);
        let mut iter = tier.into_iter();
        assert!(iter.next().is_some());
        assert!(iter.next().is_some());
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_accept_header_values() {
        assert_eq!(HttpAccept::Json.header_value(), "application/json");
        assert_eq!(HttpAccept::Html.header_value(), "text/html");
        assert_eq!(HttpAccept::default(), HttpAccept::Html);
    }
}
