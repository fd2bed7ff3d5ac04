//! Search orchestration: runs one criteria against one or many indexers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::adapter::Indexer;
use crate::criteria::SearchCriteria;
use crate::definition::ProviderDefinition;
use crate::dispatch::IndexerHttpClient;
use crate::error::ErrorKind;
use crate::release::{dedupe_by_guid, ReleaseInfo};
use crate::session::CookieJar;
use crate::IndexerError;

/// Something that went wrong for one indexer during a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchWarning {
    pub indexer: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl SearchWarning {
    fn from_error(indexer: &str, err: &IndexerError) -> Self {
        Self {
            indexer: indexer.to_string(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Outcome of querying one indexer. Never an error: failures become warnings.
#[derive(Debug, Clone, Serialize)]
pub struct IndexerQueryResult {
    pub indexer: String,
    pub releases: Vec<ReleaseInfo>,
    pub warnings: Vec<SearchWarning>,
    pub duration_ms: u64,
}

impl IndexerQueryResult {
    fn new(indexer: &str) -> Self {
        Self {
            indexer: indexer.to_string(),
            releases: Vec::new(),
            warnings: Vec::new(),
            duration_ms: 0,
        }
    }

    fn warn(&mut self, err: &IndexerError) {
        warn!(indexer = %self.indexer, kind = %err.kind(), error = %err, "Indexer query degraded");
        self.warnings.push(SearchWarning::from_error(&self.indexer, err));
    }

    /// True when the query ran without any warning.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Runs criteria through generator, dispatch layer and parser.
///
/// Keeps one cookie jar per definition id so sessions survive across calls.
pub struct IndexerSearch {
    client: Arc<IndexerHttpClient>,
    sessions: Mutex<HashMap<String, CookieJar>>,
}

impl IndexerSearch {
    pub fn new(client: Arc<IndexerHttpClient>) -> Self {
        Self {
            client,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn client(&self) -> &IndexerHttpClient {
        &self.client
    }

    /// The cookie jar bound to a definition, created on first use.
    pub fn session(&self, definition: &ProviderDefinition) -> CookieJar {
        self.sessions
            .lock()
            .entry(definition.id.clone())
            .or_default()
            .clone()
    }

    /// Queries one indexer.
    ///
    /// Tiers run in order; the first tier yielding releases ends the search.
    /// Within a tier, an empty page ends that tier. A dispatch failure stops
    /// the query and keeps what earlier pages produced; a parse or mapping
    /// failure discards the releases of this round.
    pub async fn fetch(
        &self,
        indexer: &dyn Indexer,
        definition: &ProviderDefinition,
        criteria: &SearchCriteria,
    ) -> IndexerQueryResult {
        let start = Instant::now();
        let mut result = IndexerQueryResult::new(indexer.name());

        if !indexer.capabilities().supports(criteria) {
            debug!(indexer = %indexer.name(), media = criteria.media_type(), "Search type not supported");
            result.warn(&IndexerError::InvalidCriteria(format!(
                "{} search is not supported",
                criteria.media_type()
            )));
            return result;
        }

        let chain = match indexer.request_generator().generate(criteria) {
            Ok(chain) => chain,
            Err(e) => {
                result.warn(&e);
                return result;
            }
        };

        let jar = self.session(definition);
        let parser = indexer.response_parser();

        'tiers: for (tier_index, tier) in chain.into_tiers().into_iter().enumerate() {
            let mut tier_releases = Vec::new();

            for request in tier {
                let request = request.with_cookie_jar(jar.clone());
                debug!(indexer = %indexer.name(), tier = tier_index, url = %request.url(), "Fetching page");

                let response = match self.client.execute(request, definition).await {
                    Ok(response) => response,
                    Err(e) => {
                        result.warn(&e);
                        result.releases = tier_releases;
                        break 'tiers;
                    }
                };

                match parser.parse_response(&response) {
                    Ok(page) if page.is_empty() => break,
                    Ok(page) => tier_releases.extend(page),
                    Err(e) => {
                        result.warn(&e);
                        result.releases.clear();
                        break 'tiers;
                    }
                }
            }

            if !tier_releases.is_empty() {
                result.releases = tier_releases;
                break;
            }
        }

        result.releases = dedupe_by_guid(std::mem::take(&mut result.releases));
        result.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            indexer = %indexer.name(),
            releases = result.releases.len(),
            warnings = result.warnings.len(),
            duration_ms = result.duration_ms,
            "Indexer query complete"
        );
        result
    }

    /// Queries several indexers concurrently, results in input order.
    pub async fn fetch_all(
        &self,
        targets: &[(Arc<dyn Indexer>, ProviderDefinition)],
        criteria: &SearchCriteria,
    ) -> Vec<IndexerQueryResult> {
        let futures = targets
            .iter()
            .map(|(indexer, definition)| self.fetch(indexer.as_ref(), definition, criteria));
        join_all(futures).await
    }
}
