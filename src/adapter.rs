//! The two adapter interfaces every indexer implements, and the indexer trait
//! tying them to a capability declaration.

use async_trait::async_trait;
use tracing::debug;

use crate::capabilities::IndexerCapabilities;
use crate::criteria::{
    BasicSearchCriteria, BookSearchCriteria, MovieSearchCriteria, MusicSearchCriteria,
    SearchCriteria, TvSearchCriteria,
};
use crate::definition::ProviderDefinition;
use crate::dispatch::IndexerHttpClient;
use crate::error::ValidationFailure;
use crate::release::ReleaseInfo;
use crate::request::{CachePolicy, IndexerPageableRequestChain};
use crate::response::IndexerResponse;
use crate::Result;

/// Turns a criteria into concrete requests.
///
/// Implementations are pure: equal criteria yield equal chains, and nothing
/// here touches the network.
pub trait RequestGenerator: Send + Sync {
    fn movie_requests(&self, criteria: &MovieSearchCriteria) -> Result<IndexerPageableRequestChain>;

    fn music_requests(&self, criteria: &MusicSearchCriteria) -> Result<IndexerPageableRequestChain>;

    fn tv_requests(&self, criteria: &TvSearchCriteria) -> Result<IndexerPageableRequestChain>;

    fn book_requests(&self, criteria: &BookSearchCriteria) -> Result<IndexerPageableRequestChain>;

    fn basic_requests(&self, criteria: &BasicSearchCriteria) -> Result<IndexerPageableRequestChain>;

    /// Dispatches to the entry point of the active variant.
    fn generate(&self, criteria: &SearchCriteria) -> Result<IndexerPageableRequestChain> {
        match criteria {
            SearchCriteria::Movie(c) => self.movie_requests(c),
            SearchCriteria::Music(c) => self.music_requests(c),
            SearchCriteria::Tv(c) => self.tv_requests(c),
            SearchCriteria::Book(c) => self.book_requests(c),
            SearchCriteria::Basic(c) => self.basic_requests(c),
        }
    }
}

/// Turns one raw response into releases.
///
/// Parsers hold no state between calls; parsing the same response twice
/// yields the same releases.
pub trait ResponseParser: Send + Sync {
    fn parse_response(&self, response: &IndexerResponse) -> Result<Vec<ReleaseInfo>>;
}

/// A configured indexer.
#[async_trait]
pub trait Indexer: Send + Sync {
    fn name(&self) -> &str;

    fn base_url(&self) -> &str;

    fn capabilities(&self) -> &IndexerCapabilities;

    fn request_generator(&self) -> Box<dyn RequestGenerator + '_>;

    fn response_parser(&self) -> Box<dyn ResponseParser + '_>;

    /// Validates the connection with a small uncached search.
    ///
    /// Transport failures point at `base_url`, remote application errors at
    /// `api_key` with the remote message.
    async fn test_connection(
        &self,
        client: &IndexerHttpClient,
        definition: &ProviderDefinition,
    ) -> Option<ValidationFailure> {
        let criteria = SearchCriteria::Basic(BasicSearchCriteria::new("").with_paging(0, 1));
        let chain = match self.request_generator().generate(&criteria) {
            Ok(chain) => chain,
            Err(e) => return Some(ValidationFailure::from_error(&e, "base_url", "api_key")),
        };
        let Some(request) = chain.requests().next().cloned() else {
            return Some(ValidationFailure::new("", "Indexer produced no test request"));
        };

        let outcome = match client
            .execute(request.with_cache_policy(CachePolicy::Bypass), definition)
            .await
        {
            Ok(response) => self.response_parser().parse_response(&response).map(|_| ()),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => None,
            Err(e) => {
                debug!(indexer = %self.name(), error = %e, "Connection test failed");
                Some(ValidationFailure::from_error(&e, "base_url", "api_key"))
            }
        }
    }
}
