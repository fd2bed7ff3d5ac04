//! Indexer proxies and tag-based proxy selection.
//!
//! A proxy rewrites outbound requests (`pre_request`) and optionally the
//! responses coming back (`post_response`). Which proxy, if any, handles an
//! indexer's traffic is decided by [`ProxySelector`] from the tags the
//! indexer and the proxies carry.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::definition::ProxyDefinition;
use crate::error::ValidationFailure;
use crate::fetcher::HttpDispatcher;
use crate::request::IndexerRequest;
use crate::response::IndexerResponse;
use crate::Result;

/// A network proxy an indexer's requests can be routed through.
#[async_trait]
pub trait IndexerProxy: Send + Sync {
    /// The configuration this proxy was built from.
    fn definition(&self) -> &ProxyDefinition;

    /// Rewrites an outbound request.
    fn pre_request(&self, request: IndexerRequest) -> Result<IndexerRequest> {
        Ok(request)
    }

    /// Whether `post_response` does anything; when false the dispatch layer
    /// skips it.
    fn handles_response(&self) -> bool {
        false
    }

    /// Rewrites an inbound response.
    fn post_response(&self, response: IndexerResponse) -> Result<IndexerResponse> {
        Ok(response)
    }

    /// Checks that the proxy is reachable and usable.
    async fn test(&self, dispatcher: &dyn HttpDispatcher) -> Option<ValidationFailure>;

    fn id(&self) -> &str {
        &self.definition().id
    }
}

/// Picks at most one proxy for an indexer.
///
/// Candidates are the enabled proxies ordered by `(order, id)`; the first one
/// whose tags intersect the indexer's tags wins. Selection only reads the
/// table, so one selector can be shared freely across tasks.
#[derive(Clone, Default)]
pub struct ProxySelector {
    proxies: Vec<Arc<dyn IndexerProxy>>,
}

impl ProxySelector {
    pub fn new(proxies: Vec<Arc<dyn IndexerProxy>>) -> Self {
        let mut proxies: Vec<_> = proxies
            .into_iter()
            .filter(|p| p.definition().enabled)
            .collect();
        proxies.sort_by(|a, b| {
            let (a, b) = (a.definition(), b.definition());
            a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id))
        });
        Self { proxies }
    }

    /// Selector without any proxy.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn select(&self, tags: &BTreeSet<String>) -> Option<Arc<dyn IndexerProxy>> {
        if tags.is_empty() {
            return None;
        }
        self.proxies
            .iter()
            .find(|p| p.definition().matches(tags))
            .cloned()
    }

    /// Enabled proxies in selection order.
    pub fn proxies(&self) -> &[Arc<dyn IndexerProxy>] {
        &self.proxies
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }
}

impl std::fmt::Debug for ProxySelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxySelector")
            .field("proxies", &self.proxies.iter().map(|p| p.id()).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TaggedProxy {
        definition: ProxyDefinition,
    }

    #[async_trait]
    impl IndexerProxy for TaggedProxy {
        fn definition(&self) -> &ProxyDefinition {
            &self.definition
        }

        async fn test(&self, _dispatcher: &dyn HttpDispatcher) -> Option<ValidationFailure> {
            None
        }
    }

    fn proxy(id: &str, order: i32, tags: &[&str]) -> Arc<dyn IndexerProxy> {
        let mut definition = ProxyDefinition::new(id, "http").with_order(order);
        for tag in tags {
            definition = definition.with_tag(*tag);
        }
        Arc::new(TaggedProxy { definition })
    }

    fn tags(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_select_first_matching_by_order() {
        let selector = ProxySelector::new(vec![
            proxy("late", 10, &["cf"]),
            proxy("early", 1, &["cf"]),
            proxy("other", 0, &["vpn"]),
        ]);
        let picked = selector.select(&tags(&["cf"])).unwrap();
        assert_eq!(picked.id(), "early");
    }

    #[test]
    fn test_select_ties_broken_by_id() {
        let selector = ProxySelector::new(vec![proxy("b", 0, &["cf"]), proxy("a", 0, &["cf"])]);
        assert_eq!(selector.select(&tags(&["cf"])).unwrap().id(), "a");
    }

    #[test]
    fn test_select_none_without_intersection() {
        let selector = ProxySelector::new(vec![proxy("a", 0, &["cf"])]);
        assert!(selector.select(&tags(&["vpn"])).is_none());
        assert!(selector.select(&BTreeSet::new()).is_none());
        assert!(ProxySelector::empty().select(&tags(&["cf"])).is_none());
    }

    #[test]
    fn test_disabled_proxies_are_skipped() {
        let disabled: Arc<dyn IndexerProxy> = Arc::new(TaggedProxy {
            definition: ProxyDefinition::new("off", "http")
                .with_tag("cf")
                .with_enabled(false),
        });
        let selector = ProxySelector::new(vec![disabled, proxy("on", 5, &["cf"])]);
        assert_eq!(selector.len(), 1);
        assert_eq!(selector.select(&tags(&["cf"])).unwrap().id(), "on");
    }

    #[test]
    fn test_selection_is_stable_across_threads() {
        let selector = ProxySelector::new(vec![
            proxy("c", 2, &["cf", "vpn"]),
            proxy("a", 1, &["vpn"]),
            proxy("b", 1, &["cf"]),
        ]);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let selector = selector.clone();
                std::thread::spawn(move || {
                    (0..100)
                        .map(|_| selector.select(&tags(&["cf"])).map(|p| p.id().to_string()))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        for handle in handles {
            let picks = handle.join().unwrap();
            assert!(picks.iter().all(|p| p.as_deref() == Some("b")));
        }
    }

    #[test]
    fn test_default_hooks_are_identity() {
        let p = proxy("a", 0, &[]);
        let request =
            IndexerRequest::parse("https://example.com/?q=x", crate::request::HttpAccept::Html).unwrap();
        let rewritten = p.pre_request(request.clone()).unwrap();
        assert_eq!(rewritten, request);
        assert!(!p.handles_response());

        let response = IndexerResponse::new(request, 200, "body");
        assert_eq!(p.post_response(response.clone()).unwrap(), response);
    }
}
