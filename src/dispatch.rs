//! Dispatch layer: every indexer request goes through here.
//!
//! One call runs: status check → proxy selection → `pre_request` → cache
//! lookup → rate-limit wait → network call under a timeout → cache store →
//! `post_response` → status policy → cookie merge. The returned response is
//! always paired with the request the caller passed in.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use crate::cache::ResponseCache;
use crate::definition::ProviderDefinition;
use crate::fetcher::HttpDispatcher;
use crate::health::{IndexerStatusService, NoopStatusService};
use crate::proxy::{IndexerProxy, ProxySelector};
use crate::rate_limit::RateLimiter;
use crate::request::{CachePolicy, IndexerRequest};
use crate::response::IndexerResponse;
use crate::{IndexerError, Result};

/// HTTP client for indexer traffic.
///
/// Cheap to share behind an `Arc`; the rate limiter and cache are shared by
/// every concurrent call.
pub struct IndexerHttpClient {
    dispatcher: Arc<dyn HttpDispatcher>,
    proxies: ProxySelector,
    rate_limiter: Arc<RateLimiter>,
    cache: ResponseCache,
    status: Arc<dyn IndexerStatusService>,
    min_request_interval: Duration,
    timeout: Duration,
}

impl IndexerHttpClient {
    pub fn new(dispatcher: Arc<dyn HttpDispatcher>) -> Self {
        Self {
            dispatcher,
            proxies: ProxySelector::empty(),
            rate_limiter: Arc::new(RateLimiter::new()),
            cache: ResponseCache::default(),
            status: Arc::new(NoopStatusService),
            min_request_interval: Duration::ZERO,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_proxies(mut self, proxies: ProxySelector) -> Self {
        self.proxies = proxies;
        self
    }

    pub fn with_cache(mut self, cache: ResponseCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_rate_limiter(mut self, rate_limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    pub fn with_status_service(mut self, status: Arc<dyn IndexerStatusService>) -> Self {
        self.status = status;
        self
    }

    /// Interval used for indexers that do not set their own.
    pub fn with_min_request_interval(mut self, interval: Duration) -> Self {
        self.min_request_interval = interval;
        self
    }

    /// Deadline for one network call, including the wait for the body.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn dispatcher(&self) -> &dyn HttpDispatcher {
        self.dispatcher.as_ref()
    }

    pub fn proxies(&self) -> &ProxySelector {
        &self.proxies
    }

    /// The proxy that would handle `definition`'s traffic.
    pub fn proxy_for(&self, definition: &ProviderDefinition) -> Option<Arc<dyn IndexerProxy>> {
        self.proxies.select(&definition.tags)
    }

    fn rate_limit_key(definition: &ProviderDefinition, request: &IndexerRequest) -> String {
        if definition.id.is_empty() {
            request.host_key()
        } else {
            definition.id.clone()
        }
    }

    /// Executes one request on behalf of an indexer.
    pub async fn execute(
        &self,
        request: IndexerRequest,
        definition: &ProviderDefinition,
    ) -> Result<IndexerResponse> {
        if let Some(until) = self.status.suspended_until(definition) {
            debug!(indexer = %definition.display_name(), %until, "Indexer suspended, not dispatching");
            return Err(IndexerError::Suspended(
                definition.display_name().to_string(),
                until,
            ));
        }

        let proxy = self.proxy_for(definition);
        let outbound = match &proxy {
            Some(proxy) => {
                debug!(indexer = %definition.display_name(), proxy = %proxy.id(), "Using proxy");
                proxy.pre_request(request.clone())?
            }
            None => request.clone(),
        };

        let policy = outbound.cache_policy();
        let key = outbound.cache_key();
        let cached = match policy {
            CachePolicy::Bypass => None,
            _ => self.cache.get(&key),
        };

        let raw = match cached {
            Some(hit) => {
                debug!(url = %request.url(), "Cache hit");
                hit.with_from_cache(true)
            }
            None => match self.fetch(&outbound, definition).await {
                Ok(raw) => {
                    let ttl = match policy {
                        CachePolicy::Default => Some(self.cache.ttl()),
                        CachePolicy::Ttl(ttl) => Some(ttl),
                        CachePolicy::Bypass => None,
                    };
                    if let Some(ttl) = ttl.filter(|_| raw.is_success()) {
                        self.cache.insert(key, raw.clone(), ttl);
                    }
                    raw
                }
                Err(e) => {
                    warn!(indexer = %definition.display_name(), url = %request.url(), error = %e, "Request failed");
                    self.status.record_failure(definition, &e);
                    return Err(e);
                }
            },
        };

        let from_cache = raw.from_cache();
        match self.finish(raw, proxy.as_deref(), request) {
            Ok(response) => {
                if !from_cache {
                    if response.is_success() {
                        self.status.record_success(definition);
                    } else {
                        let failure = IndexerError::HttpStatus {
                            url: response.request().url().to_string(),
                            status: response.status(),
                        };
                        debug!(indexer = %definition.display_name(), error = %failure, "Suppressed HTTP error");
                        self.status.record_failure(definition, &failure);
                    }
                }
                Ok(response)
            }
            Err(e) => {
                warn!(indexer = %definition.display_name(), error = %e, "Response rejected");
                if !from_cache {
                    self.status.record_failure(definition, &e);
                }
                Err(e)
            }
        }
    }

    async fn fetch(
        &self,
        outbound: &IndexerRequest,
        definition: &ProviderDefinition,
    ) -> Result<IndexerResponse> {
        let interval = definition
            .min_request_interval()
            .unwrap_or(self.min_request_interval);
        self.rate_limiter
            .wait(&Self::rate_limit_key(definition, outbound), interval)
            .await;

        debug!(indexer = %definition.display_name(), request = %outbound, "Dispatching");
        match tokio::time::timeout(self.timeout, self.dispatcher.dispatch(outbound)).await {
            Ok(result) => result.map(|raw| match raw.received_at() {
                Some(_) => raw,
                None => raw.with_received_at(Utc::now()),
            }),
            Err(_) => Err(IndexerError::Timeout(outbound.url().to_string())),
        }
    }

    fn finish(
        &self,
        raw: IndexerResponse,
        proxy: Option<&dyn IndexerProxy>,
        original: IndexerRequest,
    ) -> Result<IndexerResponse> {
        let response = match proxy {
            Some(proxy) if proxy.handles_response() => proxy.post_response(raw)?,
            _ => raw,
        };

        if !response.is_success() && !original.suppresses_http_errors() {
            return Err(IndexerError::HttpStatus {
                url: original.url().to_string(),
                status: response.status(),
            });
        }

        if let Some(jar) = original.cookie_jar() {
            if !response.cookies().is_empty() {
                jar.update(response.cookies().clone(), None);
            }
        }

        Ok(response.with_request(original))
    }

    /// Blocking form of [`execute`](Self::execute).
    ///
    /// Runs the call on a private current-thread runtime, so it must not be
    /// called from inside an async context.
    pub fn execute_blocking(
        &self,
        request: IndexerRequest,
        definition: &ProviderDefinition,
    ) -> Result<IndexerResponse> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| IndexerError::Other(format!("Failed to start runtime: {}", e)))?;
        runtime.block_on(self.execute(request, definition))
    }
}

impl std::fmt::Debug for IndexerHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexerHttpClient")
            .field("proxies", &self.proxies)
            .field("cache", &self.cache)
            .field("min_request_interval", &self.min_request_interval)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::ProxyDefinition;
    use crate::error::ValidationFailure;
    use crate::health::BackoffStatusService;
    use crate::request::HttpAccept;
    use crate::session::CookieJar;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingDispatcher {
        calls: AtomicUsize,
        status: u16,
        body: String,
        cookies: Vec<(String, String)>,
        delay: Duration,
    }

    impl CountingDispatcher {
        fn new(status: u16, body: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                status,
                body: body.to_string(),
                cookies: Vec::new(),
                delay: Duration::ZERO,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HttpDispatcher for CountingDispatcher {
        async fn dispatch(&self, request: &IndexerRequest) -> Result<IndexerResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(IndexerResponse::new(request.clone(), self.status, self.body.clone())
                .with_cookies(self.cookies.clone()))
        }
    }

    struct FailingDispatcher;

    #[async_trait]
    impl HttpDispatcher for FailingDispatcher {
        async fn dispatch(&self, request: &IndexerRequest) -> Result<IndexerResponse> {
            Err(IndexerError::Network {
                url: request.url().to_string(),
                message: "connection refused".to_string(),
            })
        }
    }

    struct UppercaseProxy {
        definition: ProxyDefinition,
    }

    #[async_trait]
    impl IndexerProxy for UppercaseProxy {
        fn definition(&self) -> &ProxyDefinition {
            &self.definition
        }

        fn pre_request(&self, request: IndexerRequest) -> Result<IndexerRequest> {
            Ok(request.with_header("x-proxied", "1"))
        }

        fn handles_response(&self) -> bool {
            true
        }

        fn post_response(&self, response: IndexerResponse) -> Result<IndexerResponse> {
            let upper = response.content().to_uppercase();
            Ok(response.with_content(upper))
        }

        async fn test(&self, _dispatcher: &dyn HttpDispatcher) -> Option<ValidationFailure> {
            None
        }
    }

    fn request(url: &str) -> IndexerRequest {
        IndexerRequest::parse(url, HttpAccept::Html).unwrap()
    }

    fn definition() -> ProviderDefinition {
        ProviderDefinition::new("test", "binsearch")
    }

    #[tokio::test]
    async fn test_execute_pairs_response_with_original_request() {
        let dispatcher = Arc::new(CountingDispatcher::new(200, "body"));
        let client = IndexerHttpClient::new(dispatcher.clone());
        let original = request("https://example.com/?q=x");

        let response = client.execute(original.clone(), &definition()).await.unwrap();
        assert_eq!(response.content(), "body");
        assert_eq!(response.request(), &original);
        assert!(!response.from_cache());
        assert_eq!(dispatcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let dispatcher = Arc::new(CountingDispatcher::new(200, "body"));
        let client = IndexerHttpClient::new(dispatcher.clone());

        client.execute(request("https://example.com/?a=1&b=2"), &definition()).await.unwrap();
        let second = client
            .execute(request("https://example.com/?b=2&a=1"), &definition())
            .await
            .unwrap();
        assert!(second.from_cache());
        assert_eq!(dispatcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_bypass() {
        let dispatcher = Arc::new(CountingDispatcher::new(200, "body"));
        let client = IndexerHttpClient::new(dispatcher.clone());
        let req = request("https://example.com/?q=x").with_cache_policy(CachePolicy::Bypass);

        client.execute(req.clone(), &definition()).await.unwrap();
        client.execute(req, &definition()).await.unwrap();
        assert_eq!(dispatcher.calls(), 2);
        assert!(client.cache().is_empty());
    }

    #[tokio::test]
    async fn test_http_error_is_not_cached() {
        let dispatcher = Arc::new(CountingDispatcher::new(503, "down"));
        let client = IndexerHttpClient::new(dispatcher.clone());

        let err = client.execute(request("https://example.com/"), &definition()).await.unwrap_err();
        assert!(matches!(err, IndexerError::HttpStatus { status: 503, .. }));
        assert!(client.cache().is_empty());
    }

    #[tokio::test]
    async fn test_suppressed_http_error_is_returned() {
        let dispatcher = Arc::new(CountingDispatcher::new(404, "missing"));
        let client = IndexerHttpClient::new(dispatcher);

        let response = client
            .execute(request("https://example.com/").with_suppressed_http_errors(), &definition())
            .await
            .unwrap();
        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn test_suppressed_server_error_feeds_backoff() {
        let dispatcher = Arc::new(CountingDispatcher::new(502, "<html><body><h1>502 Bad Gateway</h1><hr></body></html>"));
        let status = Arc::new(BackoffStatusService::default());
        let client = IndexerHttpClient::new(dispatcher.clone()).with_status_service(status.clone());

        let response = client
            .execute(request("https://example.com/api").with_suppressed_http_errors(), &definition())
            .await
            .unwrap();
        assert_eq!(response.status(), 502);
        assert_eq!(status.consecutive_failures("test"), 1);
        assert!(client.cache().is_empty());

        let err = client
            .execute(request("https://example.com/api").with_suppressed_http_errors(), &definition())
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::Suspended(..)));
        assert_eq!(dispatcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_success_clears_backoff_and_stamps_response() {
        let status = Arc::new(BackoffStatusService::default());
        let client = IndexerHttpClient::new(Arc::new(CountingDispatcher::new(200, "ok")))
            .with_status_service(status.clone());

        let response = client.execute(request("https://example.com/"), &definition()).await.unwrap();
        assert_eq!(status.consecutive_failures("test"), 0);
        let stamped = response.received_at().unwrap();

        let cached = client.execute(request("https://example.com/"), &definition()).await.unwrap();
        assert!(cached.from_cache());
        assert_eq!(cached.received_at(), Some(stamped));
    }

    #[tokio::test]
    async fn test_transport_failure_reports_to_status_service() {
        let status = Arc::new(BackoffStatusService::default());
        let client = IndexerHttpClient::new(Arc::new(FailingDispatcher)).with_status_service(status.clone());

        let err = client.execute(request("https://example.com/"), &definition()).await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(status.consecutive_failures("test"), 1);
        assert!(client.cache().is_empty());

        // Backed off now: the next call fails fast.
        let err = client.execute(request("https://example.com/"), &definition()).await.unwrap_err();
        assert!(matches!(err, IndexerError::Suspended(..)));
    }

    #[tokio::test]
    async fn test_timeout() {
        let mut slow = CountingDispatcher::new(200, "late");
        slow.delay = Duration::from_millis(200);
        let client = IndexerHttpClient::new(Arc::new(slow)).with_timeout(Duration::from_millis(20));

        let err = client.execute(request("https://example.com/"), &definition()).await.unwrap_err();
        assert!(matches!(err, IndexerError::Timeout(_)));
        assert!(client.cache().is_empty());
    }

    #[tokio::test]
    async fn test_proxy_hooks_run_and_post_response_applies_to_cache_hits() {
        let dispatcher = Arc::new(CountingDispatcher::new(200, "body"));
        let proxy: Arc<dyn IndexerProxy> = Arc::new(UppercaseProxy {
            definition: ProxyDefinition::new("upper", "custom").with_tag("cf"),
        });
        let client = IndexerHttpClient::new(dispatcher.clone())
            .with_proxies(ProxySelector::new(vec![proxy]));
        let def = definition().with_tag("cf");

        let first = client.execute(request("https://example.com/"), &def).await.unwrap();
        let second = client.execute(request("https://example.com/"), &def).await.unwrap();
        assert_eq!(first.content(), "BODY");
        assert_eq!(second.content(), "BODY");
        assert!(second.from_cache());
        assert_eq!(dispatcher.calls(), 1);
        // The cache holds the raw answer.
        let raw = client.cache().get(&request("https://example.com/").cache_key()).unwrap();
        assert_eq!(raw.content(), "body");
    }

    #[tokio::test]
    async fn test_untagged_indexer_bypasses_proxy() {
        let dispatcher = Arc::new(CountingDispatcher::new(200, "body"));
        let proxy: Arc<dyn IndexerProxy> = Arc::new(UppercaseProxy {
            definition: ProxyDefinition::new("upper", "custom").with_tag("cf"),
        });
        let client = IndexerHttpClient::new(dispatcher).with_proxies(ProxySelector::new(vec![proxy]));

        let response = client.execute(request("https://example.com/"), &definition()).await.unwrap();
        assert_eq!(response.content(), "body");
        assert!(client.proxy_for(&definition()).is_none());
    }

    #[tokio::test]
    async fn test_cookies_merge_into_request_jar() {
        let mut dispatcher = CountingDispatcher::new(200, "body");
        dispatcher.cookies = vec![("session".to_string(), "abc".to_string())];
        let client = IndexerHttpClient::new(Arc::new(dispatcher));
        let jar = CookieJar::new();

        client
            .execute(request("https://example.com/").with_cookie_jar(jar.clone()), &definition())
            .await
            .unwrap();
        assert_eq!(jar.get("session").as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_rate_limit_spaces_calls() {
        let dispatcher = Arc::new(CountingDispatcher::new(200, "body"));
        let client = IndexerHttpClient::new(dispatcher.clone());
        let def = definition().with_min_request_interval(Duration::from_millis(40));

        let start = std::time::Instant::now();
        for i in 0..3 {
            let req = request(&format!("https://example.com/?page={}", i));
            client.execute(req, &def).await.unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(80));
        assert_eq!(dispatcher.calls(), 3);
    }

    #[test]
    fn test_execute_blocking() {
        let dispatcher = Arc::new(CountingDispatcher::new(200, "blocking"));
        let client = IndexerHttpClient::new(dispatcher);
        let response = client
            .execute_blocking(request("https://example.com/"), &definition())
            .unwrap();
        assert_eq!(response.content(), "blocking");
    }
}
