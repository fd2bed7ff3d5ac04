//! BinSearch indexer (HTML results page).

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

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
use crate::parse_util::{coerce_int, from_time_ago, normalize_whitespace, parse_imdb_id, parse_size};
use crate::release::ReleaseInfo;
use crate::request::{HttpAccept, IndexerPageableRequestChain, IndexerRequest};
use crate::response::IndexerResponse;
use crate::{IndexerError, Result};

pub const DEFAULT_BASE_URL: &str = "https://binsearch.info/";

/// Settings for BinSearch; the site needs no credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinSearchSettings {
    /// Overrides the public site, e.g. for a mirror.
    #[serde(default)]
    pub base_url: Option<String>,
}

/// BinSearch indexer.
pub struct BinSearch {
    name: String,
    base_url: String,
    capabilities: IndexerCapabilities,
}

impl BinSearch {
    pub fn new(definition: &ProviderDefinition) -> Result<Self> {
        let settings: BinSearchSettings = definition.settings()?;
        let base_url = settings
            .base_url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self::with_base_url(definition.display_name(), &base_url)
    }

    pub fn with_base_url(name: &str, base_url: &str) -> Result<Self> {
        url::Url::parse(base_url).map_err(|e| IndexerError::config("base_url", e.to_string()))?;
        Ok(Self {
            name: name.to_string(),
            base_url: format!("{}/", base_url.trim_end_matches('/')),
            capabilities: capabilities(),
        })
    }
}

fn capabilities() -> IndexerCapabilities {
    IndexerCapabilities {
        tv_search_params: vec![TvSearchParam::Q, TvSearchParam::Season, TvSearchParam::Ep],
        movie_search_params: vec![MovieSearchParam::Q],
        music_search_params: vec![MusicSearchParam::Q],
        book_search_params: vec![BookSearchParam::Q],
        categories: CategoryMap::new()
            .with("featurefilm", cats::MOVIES, "Feature Film")
            .with("shortfilm", cats::MOVIES, "Short Film")
            .with("miniseries", cats::TV, "Miniseries")
            .with("other", cats::OTHER, "Other"),
        ..Default::default()
    }
}

impl Indexer for BinSearch {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn capabilities(&self) -> &IndexerCapabilities {
        &self.capabilities
    }

    fn request_generator(&self) -> Box<dyn RequestGenerator + '_> {
        Box::new(BinSearchRequestGenerator {
            base_url: &self.base_url,
            capabilities: &self.capabilities,
        })
    }

    fn response_parser(&self) -> Box<dyn ResponseParser + '_> {
        Box::new(BinSearchParser::new(&self.base_url, &self.capabilities.categories))
    }
}

/// Builds BinSearch's advanced-search URLs.
pub struct BinSearchRequestGenerator<'a> {
    base_url: &'a str,
    capabilities: &'a IndexerCapabilities,
}

impl<'a> BinSearchRequestGenerator<'a> {
    pub fn new(base_url: &'a str, capabilities: &'a IndexerCapabilities) -> Self {
        Self {
            base_url,
            capabilities,
        }
    }

    fn paged(&self, term: String, common: &SearchCommon) -> Result<IndexerPageableRequestChain> {
        let request = IndexerRequest::builder(self.base_url)
            .accept(HttpAccept::Html)
            .param("adv_col", "on")
            .param("postdate", "date")
            .param("adv_sort", "date")
            .param("q", term)
            .param("min", common.offset)
            .param("max", self.capabilities.effective_limit(common.limit))
            .build()?;

        let mut chain = IndexerPageableRequestChain::new();
        chain.add(vec![request]);
        Ok(chain)
    }
}

impl RequestGenerator for BinSearchRequestGenerator<'_> {
    fn movie_requests(&self, criteria: &MovieSearchCriteria) -> Result<IndexerPageableRequestChain> {
        self.paged(criteria.search_term(), &criteria.common)
    }

    fn music_requests(&self, criteria: &MusicSearchCriteria) -> Result<IndexerPageableRequestChain> {
        self.paged(criteria.search_term(), &criteria.common)
    }

    fn tv_requests(&self, criteria: &TvSearchCriteria) -> Result<IndexerPageableRequestChain> {
        self.paged(criteria.search_term(), &criteria.common)
    }

    fn book_requests(&self, criteria: &BookSearchCriteria) -> Result<IndexerPageableRequestChain> {
        self.paged(criteria.search_term(), &criteria.common)
    }

    fn basic_requests(&self, criteria: &BasicSearchCriteria) -> Result<IndexerPageableRequestChain> {
        self.paged(criteria.search_term(), &criteria.common)
    }
}

struct RowSelectors {
    row: Selector,
    name: Selector,
    info: Selector,
    tags: Selector,
    files: Selector,
    date: Selector,
    size: Selector,
    grabs: Selector,
    category: Selector,
    imdb: Selector,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| IndexerError::Parse(format!("Failed to parse selector: {:?}", e)))
}

impl RowSelectors {
    fn new() -> Result<Self> {
        Ok(Self {
            row: selector("table.torrent_table > tbody > tr.torrent")?,
            name: selector("a.torrent_name")?,
            info: selector("div.torrent_info")?,
            tags: selector("div.tags")?,
            files: selector("td:nth-child(3)")?,
            date: selector("td:nth-child(4)")?,
            size: selector("td:nth-child(5)")?,
            grabs: selector("td:nth-child(6)")?,
            category: selector("td.cats_col > div")?,
            imdb: selector(r#"a[href^="https://www.imdb.com"]"#)?,
        })
    }
}

/// Parses BinSearch result tables.
///
/// A row missing one of its required cells is skipped; a row whose category
/// has no mapping fails the whole page.
pub struct BinSearchParser<'a> {
    base_url: &'a str,
    categories: &'a CategoryMap,
}

impl<'a> BinSearchParser<'a> {
    pub fn new(base_url: &'a str, categories: &'a CategoryMap) -> Self {
        Self {
            base_url,
            categories,
        }
    }

    fn parse_row(
        &self,
        row: ElementRef<'_>,
        selectors: &RowSelectors,
        now: DateTime<Utc>,
    ) -> Result<Option<ReleaseInfo>> {
        let Some(link) = row.select(&selectors.name).next() else {
            return Ok(None);
        };
        let Some(href) = link.value().attr("href").filter(|h| !h.is_empty()) else {
            return Ok(None);
        };
        let Some(category_class) = row
            .select(&selectors.category)
            .next()
            .and_then(|div| div.value().attr("class"))
        else {
            return Ok(None);
        };
        let (Some(files_cell), Some(date_cell), Some(size_cell), Some(grabs_cell)) = (
            row.select(&selectors.files).next(),
            row.select(&selectors.date).next(),
            row.select(&selectors.size).next(),
            row.select(&selectors.grabs).next(),
        ) else {
            return Ok(None);
        };

        let token = category_class.replace("tooltip cats_", "");
        let categories = self.categories.category_of(&token)?;

        let name = element_text(link);
        let year = sibling_text(link).replace(['[', ']'], "");
        let tags = row
            .select(&selectors.info)
            .next()
            .map(first_child_text)
            .unwrap_or_default()
            .replace(" / ", " ");
        let title = normalize_whitespace(&format!("{} {} {}", name, year.trim(), tags.trim()));

        let description = row
            .select(&selectors.tags)
            .next()
            .map(element_text)
            .unwrap_or_default();

        let torrent_id = href.rsplit('=').next().unwrap_or_default();
        let info_url = format!("{}{}", self.base_url, href.trim_start_matches('/'));
        let download_url = format!(
            "{}torrents.php?action=download&id={}",
            self.base_url, torrent_id
        );

        let date_text = element_text(date_cell);
        let publish_date = from_time_ago(&date_text, now).unwrap_or_else(|| {
            warn!(date = %date_text, "Unrecognized age, using response time");
            now
        });
        let size = parse_size(&first_child_text(size_cell));

        let imdb_id = row
            .select(&selectors.imdb)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(parse_imdb_id);

        Ok(Some(
            ReleaseInfo::new(title, download_url, publish_date)
                .with_description(description)
                .with_info_url(info_url)
                .with_size(size)
                .with_files(coerce_int(&element_text(files_cell)))
                .with_grabs(coerce_int(&element_text(grabs_cell)))
                .with_categories(categories)
                .with_imdb_id(imdb_id),
        ))
    }
}

impl ResponseParser for BinSearchParser<'_> {
    fn parse_response(&self, response: &IndexerResponse) -> Result<Vec<ReleaseInfo>> {
        let document = Html::parse_document(response.content());
        let selectors = RowSelectors::new()?;
        let now = response.reference_time();

        let mut releases = Vec::new();
        for (index, row) in document.select(&selectors.row).enumerate() {
            match self.parse_row(row, &selectors, now)? {
                Some(release) => releases.push(release),
                None => debug!(row = index, url = %response.request().url(), "Skipping incomplete row"),
            }
        }
        Ok(releases)
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Text of the node right after `element`, which may be a bare text node.
fn sibling_text(element: ElementRef<'_>) -> String {
    match element.next_sibling() {
        Some(node) => match node.value().as_text() {
            Some(text) => text.trim().to_string(),
            None => ElementRef::wrap(node).map(element_text).unwrap_or_default(),
        },
        None => String::new(),
    }
}

fn first_child_text(element: ElementRef<'_>) -> String {
    match element.first_child() {
        Some(node) => match node.value().as_text() {
            Some(text) => text.trim().to_string(),
            None => ElementRef::wrap(node).map(element_text).unwrap_or_default(),
        },
        None => String::new(),
    }
}
