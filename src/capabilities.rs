//! Indexer capability declarations.

use serde::{Deserialize, Serialize};

use crate::category::CategoryMap;
use crate::criteria::SearchCriteria;

/// TV search parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TvSearchParam {
    Q,
    Season,
    Ep,
    ImdbId,
    TvdbId,
}

/// Movie search parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovieSearchParam {
    Q,
    ImdbId,
    TmdbId,
    Year,
}

/// Music search parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MusicSearchParam {
    Q,
    Artist,
    Album,
    Track,
    Label,
    Year,
}

/// Book search parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookSearchParam {
    Q,
    Author,
    Title,
    Publisher,
    Year,
}

/// What an indexer supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexerCapabilities {
    /// Page size used when a criteria does not ask for one.
    pub limits_default: u32,
    /// Largest page the indexer accepts.
    pub limits_max: u32,
    /// Whether free-text basic search is available.
    pub search_available: bool,
    pub tv_search_params: Vec<TvSearchParam>,
    pub movie_search_params: Vec<MovieSearchParam>,
    pub music_search_params: Vec<MusicSearchParam>,
    pub book_search_params: Vec<BookSearchParam>,
    /// Native → canonical category table.
    pub categories: CategoryMap,
}

impl Default for IndexerCapabilities {
    fn default() -> Self {
        Self {
            limits_default: 100,
            limits_max: 100,
            search_available: true,
            tv_search_params: Vec::new(),
            movie_search_params: Vec::new(),
            music_search_params: Vec::new(),
            book_search_params: Vec::new(),
            categories: CategoryMap::new(),
        }
    }
}

impl IndexerCapabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tv_search_available(&self) -> bool {
        !self.tv_search_params.is_empty()
    }

    pub fn movie_search_available(&self) -> bool {
        !self.movie_search_params.is_empty()
    }

    pub fn music_search_available(&self) -> bool {
        !self.music_search_params.is_empty()
    }

    pub fn book_search_available(&self) -> bool {
        !self.book_search_params.is_empty()
    }

    pub fn has_tv_param(&self, param: TvSearchParam) -> bool {
        self.tv_search_params.contains(&param)
    }

    pub fn has_movie_param(&self, param: MovieSearchParam) -> bool {
        self.movie_search_params.contains(&param)
    }

    pub fn has_music_param(&self, param: MusicSearchParam) -> bool {
        self.music_search_params.contains(&param)
    }

    pub fn has_book_param(&self, param: BookSearchParam) -> bool {
        self.book_search_params.contains(&param)
    }

    /// Whether the indexer can serve the given criteria variant at all.
    pub fn supports(&self, criteria: &SearchCriteria) -> bool {
        match criteria {
            SearchCriteria::Movie(_) => self.movie_search_available(),
            SearchCriteria::Music(_) => self.music_search_available(),
            SearchCriteria::Tv(_) => self.tv_search_available(),
            SearchCriteria::Book(_) => self.book_search_available(),
            SearchCriteria::Basic(_) => self.search_available,
        }
    }

    /// Clamps a requested page size to what the indexer accepts.
    pub fn effective_limit(&self, requested: u32) -> u32 {
        let limit = if requested == 0 {
            self.limits_default
        } else {
            requested
        };
        limit.min(self.limits_max)
    }
}
