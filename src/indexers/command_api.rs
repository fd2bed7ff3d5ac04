//! Indexer speaking a JSON command API (`/api?cmd=…`).
//!
//! Every answer is wrapped in `{success, error: {code, message}, data}`; a
//! `success: false` envelope is surfaced as a provider application error with
//! the remote code and message untouched.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::adapter::{Indexer, RequestGenerator, ResponseParser};
use crate::capabilities::{
    BookSearchParam, IndexerCapabilities, MovieSearchParam, MusicSearchParam, TvSearchParam,
};
use crate::category::{cats, CategoryMap};
use crate::criteria::{
    BasicSearchCriteria, BookSearchCriteria, MovieSearchCriteria, MusicSearchCriteria,
    SearchCommon, TvSearchCriteria,
};
use crate::definition::ProviderDefinition;
use crate::dispatch::IndexerHttpClient;
use crate::error::ValidationFailure;
use crate::parse_util::{parse_feed_date, parse_imdb_id};
use crate::release::ReleaseInfo;
use crate::request::{CachePolicy, HttpAccept, IndexerPageableRequestChain, IndexerRequest, IndexerRequestBuilder};
use crate::response::IndexerResponse;
use crate::{IndexerError, Result};

/// Connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandApiSettings {
    pub base_url: String,
    pub api_key: String,
}

impl CommandApiSettings {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        url::Url::parse(&self.base_url)
            .map_err(|e| IndexerError::config("base_url", e.to_string()))?;
        if self.api_key.trim().is_empty() {
            return Err(IndexerError::config("api_key", "must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    error: Option<RemoteError>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct RemoteError {
    #[serde(default)]
    code: serde_json::Value,
    #[serde(default)]
    message: String,
}

impl<T> Envelope<T> {
    /// The payload, or the remote failure as an error.
    fn into_data(self) -> Result<Option<T>> {
        if self.success {
            return Ok(self.data);
        }
        let (code, message) = match self.error {
            Some(RemoteError { code, message }) => {
                let code = match code {
                    serde_json::Value::String(s) => s,
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                };
                (code, message)
            }
            None => (String::new(), "Request failed".to_string()),
        };
        Err(IndexerError::ProviderApplication { code, message })
    }
}

#[derive(Debug, Deserialize)]
struct ApiRelease {
    id: serde_json::Value,
    title: String,
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    info_url: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    grabs: Option<u32>,
    #[serde(default)]
    files: Option<u32>,
    #[serde(default)]
    imdb_id: Option<String>,
    #[serde(default)]
    published: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VersionInfo {
    version: String,
}

/// JSON command-API indexer.
pub struct CommandApi {
    name: String,
    settings: CommandApiSettings,
    capabilities: IndexerCapabilities,
}

impl CommandApi {
    pub fn new(definition: &ProviderDefinition) -> Result<Self> {
        Self::with_settings(definition.display_name(), definition.settings()?)
    }

    pub fn with_settings(name: &str, settings: CommandApiSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            name: name.to_string(),
            settings,
            capabilities: capabilities(),
        })
    }

    fn command(&self, cmd: &str) -> IndexerRequestBuilder {
        IndexerRequestBuilder::new(&self.settings.base_url)
            .resource("api")
            .accept(HttpAccept::Json)
            .param("cmd", cmd)
            .param("apikey", &self.settings.api_key)
    }
}

fn capabilities() -> IndexerCapabilities {
    IndexerCapabilities {
        limits_default: 50,
        limits_max: 250,
        tv_search_params: vec![TvSearchParam::Q, TvSearchParam::Season, TvSearchParam::Ep],
        movie_search_params: vec![MovieSearchParam::Q, MovieSearchParam::ImdbId],
        music_search_params: vec![MusicSearchParam::Q],
        book_search_params: vec![BookSearchParam::Q],
        categories: CategoryMap::new()
            .with("movies", cats::MOVIES, "Movies")
            .with("movies-sd", cats::MOVIES_SD, "Movies SD")
            .with("movies-hd", cats::MOVIES_HD, "Movies HD")
            .with("tv", cats::TV, "TV")
            .with("tv-sd", cats::TV_SD, "TV SD")
            .with("tv-hd", cats::TV_HD, "TV HD")
            .with("music", cats::AUDIO, "Music")
            .with("books", cats::BOOKS, "Books")
            .with("other", cats::OTHER, "Other"),
        ..Default::default()
    }
}

#[async_trait]
impl Indexer for CommandApi {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_url(&self) -> &str {
        &self.settings.base_url
    }

    fn capabilities(&self) -> &IndexerCapabilities {
        &self.capabilities
    }

    fn request_generator(&self) -> Box<dyn RequestGenerator + '_> {
        Box::new(CommandApiRequestGenerator { indexer: self })
    }

    fn response_parser(&self) -> Box<dyn ResponseParser + '_> {
        Box::new(CommandApiParser::new(&self.settings.base_url, &self.capabilities.categories))
    }

    /// Asks the remote for its version instead of running a search.
    async fn test_connection(
        &self,
        client: &IndexerHttpClient,
        definition: &ProviderDefinition,
    ) -> Option<ValidationFailure> {
        let outcome = async {
            let request = self
                .command("getVersion")
                .build()?
                .with_cache_policy(CachePolicy::Bypass)
                .with_suppressed_http_errors();
            let response = client.execute(request, definition).await?;
            let version = decode::<VersionInfo>(&response)?;
            debug!(indexer = %self.name, version = ?version.map(|v| v.version), "Connection test passed");
            Ok::<_, IndexerError>(())
        }
        .await;

        outcome
            .err()
            .map(|e| ValidationFailure::from_error(&e, "base_url", "api_key"))
    }
}

/// Builds `cmd=search` requests.
pub struct CommandApiRequestGenerator<'a> {
    indexer: &'a CommandApi,
}

impl CommandApiRequestGenerator<'_> {
    fn search(&self, term: String, common: &SearchCommon) -> Result<IndexerPageableRequestChain> {
        self.search_with(term, common, None)
    }

    fn search_with(
        &self,
        term: String,
        common: &SearchCommon,
        imdb_id: Option<String>,
    ) -> Result<IndexerPageableRequestChain> {
        let categories = self.indexer.capabilities.categories.native_for(&common.categories);
        let request: IndexerRequest = self
            .indexer
            .command("search")
            .param_opt("q", Some(term))
            .param_opt("imdbid", imdb_id)
            .param_opt("cat", (!categories.is_empty()).then(|| categories.join(",")))
            .param("offset", common.offset)
            .param("limit", self.indexer.capabilities.effective_limit(common.limit))
            .build()?
            .with_suppressed_http_errors();

        let mut chain = IndexerPageableRequestChain::new();
        chain.add([request]);
        Ok(chain)
    }
}

impl RequestGenerator for CommandApiRequestGenerator<'_> {
    fn movie_requests(&self, criteria: &MovieSearchCriteria) -> Result<IndexerPageableRequestChain> {
        self.search_with(criteria.search_term(), &criteria.common, criteria.full_imdb_id())
    }

    fn music_requests(&self, criteria: &MusicSearchCriteria) -> Result<IndexerPageableRequestChain> {
        self.search(criteria.search_term(), &criteria.common)
    }

    fn tv_requests(&self, criteria: &TvSearchCriteria) -> Result<IndexerPageableRequestChain> {
        self.search(criteria.search_term(), &criteria.common)
    }

    fn book_requests(&self, criteria: &BookSearchCriteria) -> Result<IndexerPageableRequestChain> {
        self.search(criteria.search_term(), &criteria.common)
    }

    fn basic_requests(&self, criteria: &BasicSearchCriteria) -> Result<IndexerPageableRequestChain> {
        self.search(criteria.search_term(), &criteria.common)
    }
}

/// Unwraps the envelope; a body that is not an envelope falls back to the
/// HTTP status when that status is a failure.
fn decode<T: DeserializeOwned>(response: &IndexerResponse) -> Result<Option<T>> {
    let envelope: Envelope<T> = match response.json() {
        Ok(envelope) => envelope,
        Err(_) if !response.is_success() => {
            return Err(IndexerError::HttpStatus {
                url: response.request().url().to_string(),
                status: response.status(),
            })
        }
        Err(e) => return Err(e),
    };
    envelope.into_data()
}

/// Maps `data: [...]` entries to releases.
pub struct CommandApiParser<'a> {
    base_url: &'a str,
    categories: &'a CategoryMap,
}

impl<'a> CommandApiParser<'a> {
    pub fn new(base_url: &'a str, categories: &'a CategoryMap) -> Self {
        Self {
            base_url,
            categories,
        }
    }

    fn release(&self, item: ApiRelease, now: DateTime<Utc>) -> Result<ReleaseInfo> {
        let id = match item.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        let download_url = item
            .download_url
            .unwrap_or_else(|| {
                format!(
                    "{}/api?cmd=download&id={}",
                    self.base_url.trim_end_matches('/'),
                    urlencoding::encode(&id)
                )
            });
        let categories = match item.category.as_deref() {
            Some(token) => self.categories.category_of(token)?,
            None => Vec::new(),
        };
        let publish_date = item
            .published
            .as_deref()
            .and_then(parse_feed_date)
            .unwrap_or(now);

        let mut release = ReleaseInfo::new(item.title, download_url, publish_date)
            .with_size(item.size)
            .with_grabs(item.grabs)
            .with_files(item.files)
            .with_categories(categories)
            .with_imdb_id(item.imdb_id.as_deref().and_then(parse_imdb_id));
        if let Some(info_url) = item.info_url {
            release = release.with_info_url(info_url);
        }
        if let Some(description) = item.description {
            release = release.with_description(description);
        }
        Ok(release)
    }
}

impl ResponseParser for CommandApiParser<'_> {
    fn parse_response(&self, response: &IndexerResponse) -> Result<Vec<ReleaseInfo>> {
        let items: Vec<ApiRelease> = decode(response)?.unwrap_or_default();
        let now = response.reference_time();

        items
            .into_iter()
            .map(|item| self.release(item, now))
            .collect()
    }
}
