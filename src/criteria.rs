//! Search criteria, one variant per media type.

use serde::{Deserialize, Serialize};

/// Default page size when the caller does not ask for one.
pub const DEFAULT_LIMIT: u32 = 100;

/// Fields shared by every criteria variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCommon {
    /// Free-text search terms.
    pub query: Option<String>,
    /// Requested canonical categories (empty = all).
    #[serde(default)]
    pub categories: Vec<i32>,
    /// Number of results to skip.
    #[serde(default)]
    pub offset: u32,
    /// Maximum number of results.
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

impl Default for SearchCommon {
    fn default() -> Self {
        Self {
            query: None,
            categories: Vec::new(),
            offset: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl SearchCommon {
    fn with_query(query: impl Into<String>) -> Self {
        let query = query.into();
        Self {
            query: if query.trim().is_empty() { None } else { Some(query) },
            ..Default::default()
        }
    }

    /// The query with punctuation stripped and whitespace collapsed.
    pub fn sanitized_query(&self) -> String {
        self.query.as_deref().map(sanitize).unwrap_or_default()
    }
}

/// Strips characters indexers choke on and collapses whitespace.
pub fn sanitize(term: &str) -> String {
    let kept: String = term
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '.' | '_' | '\'' | '&' | '(' | ')') {
                c
            } else {
                ' '
            }
        })
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn join_terms(parts: &[Option<&str>]) -> String {
    let joined = parts
        .iter()
        .flatten()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    sanitize(&joined)
}

macro_rules! common_builders {
    ($ty:ident) => {
        impl $ty {
            /// Sets the paging window.
            pub fn with_paging(mut self, offset: u32, limit: u32) -> Self {
                self.common.offset = offset;
                self.common.limit = limit;
                self
            }

            /// Sets the requested canonical categories.
            pub fn with_categories(mut self, categories: Vec<i32>) -> Self {
                self.common.categories = categories;
                self
            }
        }
    };
}

/// Movie search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieSearchCriteria {
    #[serde(flatten)]
    pub common: SearchCommon,
    pub imdb_id: Option<String>,
    pub tmdb_id: Option<u32>,
    pub year: Option<u32>,
}

impl MovieSearchCriteria {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            common: SearchCommon::with_query(query),
            ..Default::default()
        }
    }

    pub fn with_imdb_id(mut self, imdb_id: impl Into<String>) -> Self {
        self.imdb_id = Some(imdb_id.into());
        self
    }

    pub fn with_year(mut self, year: u32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn search_term(&self) -> String {
        self.common.sanitized_query()
    }

    /// IMDb id with the `tt` prefix and at least seven digits.
    pub fn full_imdb_id(&self) -> Option<String> {
        self.imdb_id.as_deref().and_then(normalize_imdb_id)
    }
}

common_builders!(MovieSearchCriteria);

/// TV search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TvSearchCriteria {
    #[serde(flatten)]
    pub common: SearchCommon,
    pub season: Option<u32>,
    /// Episode number, or an air date such as `2021/03/04` for daily shows.
    pub episode: Option<String>,
    pub imdb_id: Option<String>,
    pub tvdb_id: Option<u32>,
}

impl TvSearchCriteria {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            common: SearchCommon::with_query(query),
            ..Default::default()
        }
    }

    pub fn with_season(mut self, season: u32) -> Self {
        self.season = Some(season);
        self
    }

    pub fn with_episode(mut self, episode: impl Into<String>) -> Self {
        self.episode = Some(episode.into());
        self
    }

    pub fn with_imdb_id(mut self, imdb_id: impl Into<String>) -> Self {
        self.imdb_id = Some(imdb_id.into());
        self
    }

    /// `S01E02`, `S01`, or a dotted air date.
    pub fn episode_search_string(&self) -> Option<String> {
        match (self.season, self.episode.as_deref()) {
            (Some(season), Some(ep)) => match ep.trim().parse::<u32>() {
                Ok(ep) => Some(format!("S{:02}E{:02}", season, ep)),
                Err(_) => Some(ep.trim().replace('/', ".")),
            },
            (Some(season), None) => Some(format!("S{:02}", season)),
            (None, Some(ep)) if ep.contains('/') => Some(ep.trim().replace('/', ".")),
            _ => None,
        }
    }

    /// Query plus the episode search string.
    pub fn search_term(&self) -> String {
        let episode = self.episode_search_string();
        let query = self.common.sanitized_query();
        join_terms(&[Some(query.as_str()), episode.as_deref()])
    }

    pub fn full_imdb_id(&self) -> Option<String> {
        self.imdb_id.as_deref().and_then(normalize_imdb_id)
    }
}

common_builders!(TvSearchCriteria);

/// Music search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MusicSearchCriteria {
    #[serde(flatten)]
    pub common: SearchCommon,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub track: Option<String>,
    pub label: Option<String>,
    pub year: Option<u32>,
}

impl MusicSearchCriteria {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            common: SearchCommon::with_query(query),
            ..Default::default()
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    /// The free-text query, or artist + album + track when there is none.
    pub fn search_term(&self) -> String {
        if self.common.query.is_some() {
            return self.common.sanitized_query();
        }
        join_terms(&[
            self.artist.as_deref(),
            self.album.as_deref(),
            self.track.as_deref(),
        ])
    }
}

common_builders!(MusicSearchCriteria);

/// Book search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSearchCriteria {
    #[serde(flatten)]
    pub common: SearchCommon,
    pub author: Option<String>,
    pub title: Option<String>,
    pub publisher: Option<String>,
    pub year: Option<u32>,
}

impl BookSearchCriteria {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            common: SearchCommon::with_query(query),
            ..Default::default()
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// The free-text query, or author + title when there is none.
    pub fn search_term(&self) -> String {
        if self.common.query.is_some() {
            return self.common.sanitized_query();
        }
        join_terms(&[self.author.as_deref(), self.title.as_deref()])
    }
}

common_builders!(BookSearchCriteria);

/// Free-text search without media-specific fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicSearchCriteria {
    #[serde(flatten)]
    pub common: SearchCommon,
}

impl BasicSearchCriteria {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            common: SearchCommon::with_query(query),
        }
    }

    pub fn search_term(&self) -> String {
        self.common.sanitized_query()
    }
}

common_builders!(BasicSearchCriteria);

/// One query; exactly one media type is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SearchCriteria {
    Movie(MovieSearchCriteria),
    Music(MusicSearchCriteria),
    Tv(TvSearchCriteria),
    Book(BookSearchCriteria),
    Basic(BasicSearchCriteria),
}

impl SearchCriteria {
    pub fn common(&self) -> &SearchCommon {
        match self {
            SearchCriteria::Movie(c) => &c.common,
            SearchCriteria::Music(c) => &c.common,
            SearchCriteria::Tv(c) => &c.common,
            SearchCriteria::Book(c) => &c.common,
            SearchCriteria::Basic(c) => &c.common,
        }
    }

    pub fn offset(&self) -> u32 {
        self.common().offset
    }

    pub fn limit(&self) -> u32 {
        self.common().limit
    }

    pub fn categories(&self) -> &[i32] {
        &self.common().categories
    }

    /// The sanitized search term of the active variant.
    pub fn search_term(&self) -> String {
        match self {
            SearchCriteria::Movie(c) => c.search_term(),
            SearchCriteria::Music(c) => c.search_term(),
            SearchCriteria::Tv(c) => c.search_term(),
            SearchCriteria::Book(c) => c.search_term(),
            SearchCriteria::Basic(c) => c.search_term(),
        }
    }

    /// Short label of the active variant.
    pub fn media_type(&self) -> &'static str {
        match self {
            SearchCriteria::Movie(_) => "movie",
            SearchCriteria::Music(_) => "music",
            SearchCriteria::Tv(_) => "tv",
            SearchCriteria::Book(_) => "book",
            SearchCriteria::Basic(_) => "basic",
        }
    }
}

impl From<MovieSearchCriteria> for SearchCriteria {
    fn from(c: MovieSearchCriteria) -> Self {
        SearchCriteria::Movie(c)
    }
}

impl From<MusicSearchCriteria> for SearchCriteria {
    fn from(c: MusicSearchCriteria) -> Self {
        SearchCriteria::Music(c)
    }
}

impl From<TvSearchCriteria> for SearchCriteria {
    fn from(c: TvSearchCriteria) -> Self {
        SearchCriteria::Tv(c)
    }
}

impl From<BookSearchCriteria> for SearchCriteria {
    fn from(c: BookSearchCriteria) -> Self {
        SearchCriteria::Book(c)
    }
}

impl From<BasicSearchCriteria> for SearchCriteria {
    fn from(c: BasicSearchCriteria) -> Self {
        SearchCriteria::Basic(c)
    }
}

/// Normalizes `123`, `0000123` or `tt0000123` to `tt0000123`.
pub fn normalize_imdb_id(raw: &str) -> Option<String> {
    let digits = raw.trim().trim_start_matches("tt");
    let id: u32 = digits.parse().ok()?;
    if id == 0 {
        return None;
    }
    Some(format!("tt{:07}", id))
}
