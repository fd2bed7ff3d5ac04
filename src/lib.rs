//! # a3s-indexer
//!
//! Request/response pipeline for content indexers.
//!
//! A [`SearchCriteria`] goes through an indexer's [`RequestGenerator`], which
//! turns it into tiers of concrete requests. Each request is executed by the
//! [`IndexerHttpClient`] (proxy routing, rate limiting, caching, backoff) and
//! the raw answer is mapped to [`ReleaseInfo`] records by the indexer's
//! [`ResponseParser`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use a3s_indexer::{IndexerSearch, MovieSearchCriteria, RelayConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = RelayConfig::load("a3s-indexer.toml")?;
//!     let search = IndexerSearch::new(Arc::new(config.build_client()?));
//!     let criteria = MovieSearchCriteria::new("the matrix").into();
//!
//!     for result in search.fetch_all(&config.build_indexers()?, &criteria).await {
//!         for release in &result.releases {
//!             println!("{}: {}", result.indexer, release.title);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod adapter;
mod cache;
mod capabilities;
mod config;
mod criteria;
mod definition;
mod dispatch;
mod error;
mod health;
mod rate_limit;
mod release;
mod request;
mod response;
mod search;

pub mod category;
pub mod fetcher;
pub mod fetcher_http;
pub mod indexers;
pub mod parse_util;
pub mod proxies;
pub mod proxy;
pub mod session;

pub use adapter::{Indexer, RequestGenerator, ResponseParser};
pub use cache::ResponseCache;
pub use capabilities::{
    BookSearchParam, IndexerCapabilities, MovieSearchParam, MusicSearchParam, TvSearchParam,
};
pub use category::{CategoryMap, CategoryMapping, StandardCategory};
pub use config::{ClientSettings, RelayConfig};
pub use criteria::{
    BasicSearchCriteria, BookSearchCriteria, MovieSearchCriteria, MusicSearchCriteria,
    SearchCommon, SearchCriteria, TvSearchCriteria,
};
pub use definition::{ProviderDefinition, ProxyDefinition};
pub use dispatch::IndexerHttpClient;
pub use error::{ErrorKind, IndexerError, Result, ValidationFailure};
pub use health::{BackoffStatusService, IndexerStatusService, NoopStatusService};
pub use rate_limit::RateLimiter;
pub use release::ReleaseInfo;
pub use request::{
    CachePolicy, HttpAccept, IndexerPageableRequestChain, IndexerRequest, IndexerRequestBuilder,
    RequestTier,
};
pub use response::IndexerResponse;
pub use search::{IndexerQueryResult, IndexerSearch, SearchWarning};
