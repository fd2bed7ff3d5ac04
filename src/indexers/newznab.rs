//! Newznab indexer (XML feed API).

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::adapter::{Indexer, RequestGenerator, ResponseParser};
use crate::capabilities::{
    BookSearchParam, IndexerCapabilities, MovieSearchParam, MusicSearchParam, TvSearchParam,
};
use crate::category::CategoryMap;
use crate::criteria::{
    BasicSearchCriteria, BookSearchCriteria, MovieSearchCriteria, MusicSearchCriteria,
    SearchCommon, TvSearchCriteria,
};
use crate::definition::ProviderDefinition;
use crate::parse_util::{parse_feed_date, parse_imdb_id};
use crate::release::ReleaseInfo;
use crate::request::{HttpAccept, IndexerPageableRequestChain, IndexerRequestBuilder};
use crate::response::IndexerResponse;
use crate::{IndexerError, Result};

/// Site-specific categories start here and are never part of the standard table.
const CUSTOM_CATEGORY_START: i32 = 100_000;

fn default_api_path() -> String {
    "/api".to_string()
}

/// Newznab connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewznabSettings {
    pub base_url: String,
    #[serde(default = "default_api_path")]
    pub api_path: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl NewznabSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_path: default_api_path(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn validate(&self) -> Result<()> {
        url::Url::parse(&self.base_url)
            .map_err(|e| IndexerError::config("base_url", e.to_string()))?;
        Ok(())
    }
}

/// Newznab indexer.
pub struct Newznab {
    name: String,
    settings: NewznabSettings,
    capabilities: IndexerCapabilities,
}

impl Newznab {
    pub fn new(definition: &ProviderDefinition) -> Result<Self> {
        Self::with_settings(definition.display_name(), definition.settings()?)
    }

    pub fn with_settings(name: &str, settings: NewznabSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            name: name.to_string(),
            settings,
            capabilities: capabilities(),
        })
    }
}

fn capabilities() -> IndexerCapabilities {
    IndexerCapabilities {
        tv_search_params: vec![
            TvSearchParam::Q,
            TvSearchParam::Season,
            TvSearchParam::Ep,
            TvSearchParam::ImdbId,
            TvSearchParam::TvdbId,
        ],
        movie_search_params: vec![MovieSearchParam::Q, MovieSearchParam::ImdbId],
        music_search_params: vec![
            MusicSearchParam::Q,
            MusicSearchParam::Artist,
            MusicSearchParam::Album,
        ],
        book_search_params: vec![BookSearchParam::Q, BookSearchParam::Author, BookSearchParam::Title],
        categories: CategoryMap::standard(),
        ..Default::default()
    }
}

impl Indexer for Newznab {
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
        Box::new(NewznabRequestGenerator {
            settings: &self.settings,
            capabilities: &self.capabilities,
        })
    }

    fn response_parser(&self) -> Box<dyn ResponseParser + '_> {
        Box::new(NewznabParser::new(&self.capabilities.categories))
    }
}

/// Builds `t=…` API calls; id-based forms go in their own tier ahead of the
/// text form.
pub struct NewznabRequestGenerator<'a> {
    settings: &'a NewznabSettings,
    capabilities: &'a IndexerCapabilities,
}

impl<'a> NewznabRequestGenerator<'a> {
    pub fn new(settings: &'a NewznabSettings, capabilities: &'a IndexerCapabilities) -> Self {
        Self {
            settings,
            capabilities,
        }
    }

    fn call(&self, function: &str, common: &SearchCommon) -> IndexerRequestBuilder {
        let categories = self.capabilities.categories.native_for(&common.categories);
        let cat = (!categories.is_empty()).then(|| categories.join(","));

        IndexerRequestBuilder::new(&self.settings.base_url)
            .resource(&self.settings.api_path)
            .accept(HttpAccept::Xml)
            .param("t", function)
            .param_opt("apikey", self.settings.api_key.as_deref())
            .param_opt("cat", cat)
            .param("extended", 1)
            .param("offset", common.offset)
            .param("limit", self.capabilities.effective_limit(common.limit))
    }

    fn chain(
        &self,
        id_form: Option<IndexerRequestBuilder>,
        text_form: Option<IndexerRequestBuilder>,
    ) -> Result<IndexerPageableRequestChain> {
        let mut chain = IndexerPageableRequestChain::new();
        for builder in [id_form, text_form].into_iter().flatten() {
            chain.add_tier([builder.build()?.with_suppressed_http_errors()]);
        }
        Ok(chain)
    }
}

fn digits(imdb_id: String) -> String {
    imdb_id.trim_start_matches("tt").to_string()
}

impl RequestGenerator for NewznabRequestGenerator<'_> {
    fn movie_requests(&self, criteria: &MovieSearchCriteria) -> Result<IndexerPageableRequestChain> {
        let imdb = criteria
            .full_imdb_id()
            .filter(|_| self.capabilities.has_movie_param(MovieSearchParam::ImdbId));
        let term = criteria.search_term();

        let id_form = imdb.map(|id| self.call("movie", &criteria.common).param("imdbid", digits(id)));
        let text_form = (id_form.is_none() || !term.is_empty())
            .then(|| self.call("movie", &criteria.common).param_opt("q", Some(term)));
        self.chain(id_form, text_form)
    }

    fn music_requests(&self, criteria: &MusicSearchCriteria) -> Result<IndexerPageableRequestChain> {
        let builder = self
            .call("music", &criteria.common)
            .param_opt("q", criteria.common.query.as_deref().map(crate::criteria::sanitize))
            .param_opt("artist", criteria.artist.as_deref())
            .param_opt("album", criteria.album.as_deref());
        self.chain(None, Some(builder))
    }

    fn tv_requests(&self, criteria: &TvSearchCriteria) -> Result<IndexerPageableRequestChain> {
        let imdb = criteria
            .full_imdb_id()
            .filter(|_| self.capabilities.has_tv_param(TvSearchParam::ImdbId));
        let query = criteria.common.sanitized_query();

        let episode_params = |builder: IndexerRequestBuilder| {
            builder
                .param_opt("season", criteria.season)
                .param_opt("ep", criteria.episode.as_deref())
        };

        let id_form = match (imdb, criteria.tvdb_id) {
            (Some(id), _) => Some(episode_params(
                self.call("tvsearch", &criteria.common).param("imdbid", digits(id)),
            )),
            (None, Some(tvdb)) => Some(episode_params(
                self.call("tvsearch", &criteria.common).param("tvdbid", tvdb),
            )),
            (None, None) => None,
        };
        let text_form = (id_form.is_none() || !query.is_empty()).then(|| {
            episode_params(self.call("tvsearch", &criteria.common).param_opt("q", Some(query)))
        });
        self.chain(id_form, text_form)
    }

    fn book_requests(&self, criteria: &BookSearchCriteria) -> Result<IndexerPageableRequestChain> {
        let builder = self
            .call("book", &criteria.common)
            .param_opt("q", criteria.common.query.as_deref().map(crate::criteria::sanitize))
            .param_opt("author", criteria.author.as_deref())
            .param_opt("title", criteria.title.as_deref());
        self.chain(None, Some(builder))
    }

    fn basic_requests(&self, criteria: &BasicSearchCriteria) -> Result<IndexerPageableRequestChain> {
        let builder = self
            .call("search", &criteria.common)
            .param_opt("q", Some(criteria.search_term()));
        self.chain(None, Some(builder))
    }
}

#[derive(Debug, Default)]
struct ItemBuilder {
    title: Option<String>,
    guid: Option<String>,
    link: Option<String>,
    comments: Option<String>,
    pub_date: Option<String>,
    description: Option<String>,
    enclosure_url: Option<String>,
    enclosure_length: Option<u64>,
    size: Option<u64>,
    grabs: Option<u32>,
    files: Option<u32>,
    imdb: Option<u32>,
    categories: Vec<String>,
}

impl ItemBuilder {
    fn set_text(&mut self, tag: &str, text: String) {
        if text.is_empty() {
            return;
        }
        match tag {
            "title" => self.title = Some(text),
            "guid" => self.guid = Some(text),
            "link" => self.link = Some(text),
            "comments" => self.comments = Some(text),
            "pubDate" => self.pub_date = Some(text),
            "description" => self.description = Some(text),
            _ => {}
        }
    }

    fn set_attr(&mut self, name: &str, value: &str) {
        match name {
            "size" => self.size = value.parse().ok(),
            "category" => self.categories.push(value.to_string()),
            "grabs" => self.grabs = value.parse().ok(),
            "files" => self.files = value.parse().ok(),
            "imdb" | "imdbid" => self.imdb = parse_imdb_id(value),
            _ => debug!(attr = name, value, "Ignoring newznab attribute"),
        }
    }

    fn set_enclosure(&mut self, element: &BytesStart<'_>) {
        for attr in element.attributes().flatten() {
            let value = attr.unescape_value().unwrap_or_default().to_string();
            match attr.key.as_ref() {
                b"url" => self.enclosure_url = Some(value),
                b"length" => self.enclosure_length = value.parse().ok(),
                _ => {}
            }
        }
    }

    fn build(self, categories: &CategoryMap, now: DateTime<Utc>) -> Result<Option<ReleaseInfo>> {
        let Some(title) = self.title else {
            return Ok(None);
        };
        let Some(download_url) = self.enclosure_url.or(self.link) else {
            return Ok(None);
        };

        let mut mapped = Vec::new();
        for token in &self.categories {
            if token.parse::<i32>().map(|id| id >= CUSTOM_CATEGORY_START).unwrap_or(false) {
                debug!(category = %token, "Skipping site-specific category");
                continue;
            }
            for id in categories.category_of(token)? {
                if !mapped.contains(&id) {
                    mapped.push(id);
                }
            }
        }

        let publish_date = self
            .pub_date
            .as_deref()
            .and_then(parse_feed_date)
            .unwrap_or(now);
        let mut release = ReleaseInfo::new(title, download_url, publish_date)
            .with_size(self.size.or(self.enclosure_length))
            .with_grabs(self.grabs)
            .with_files(self.files)
            .with_categories(mapped)
            .with_imdb_id(self.imdb);
        if let Some(guid) = self.guid {
            release = release.with_guid(guid);
        }
        if let Some(description) = self.description {
            release = release.with_description(description);
        }
        if let Some(comments) = self.comments {
            release = release.with_info_url(comments);
        }
        Ok(Some(release))
    }
}

fn attr_value(element: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| a.unescape_value().unwrap_or_default().to_string())
}

fn is_attr_tag(name: &[u8]) -> bool {
    name.ends_with(b":attr")
}

/// Parses Newznab RSS into releases.
pub struct NewznabParser<'a> {
    categories: &'a CategoryMap,
}

impl<'a> NewznabParser<'a> {
    pub fn new(categories: &'a CategoryMap) -> Self {
        Self { categories }
    }

    fn element(&self, element: &BytesStart<'_>, item: Option<&mut ItemBuilder>) -> Result<()> {
        let name = element.name();
        if name.as_ref() == b"error" {
            let code = attr_value(element, b"code").unwrap_or_default();
            let message = attr_value(element, b"description").unwrap_or_default();
            warn!(code = %code, message = %message, "Newznab API error");
            return Err(IndexerError::ProviderApplication { code, message });
        }
        if let Some(item) = item {
            if is_attr_tag(name.as_ref()) {
                if let (Some(n), Some(v)) = (attr_value(element, b"name"), attr_value(element, b"value")) {
                    item.set_attr(&n, &v);
                }
            } else if name.as_ref() == b"enclosure" {
                item.set_enclosure(element);
            }
        }
        Ok(())
    }
}

impl ResponseParser for NewznabParser<'_> {
    fn parse_response(&self, response: &IndexerResponse) -> Result<Vec<ReleaseInfo>> {
        let mut reader = Reader::from_str(response.content());
        reader.config_mut().trim_text(true);

        let now = response.reference_time();

        let mut releases = Vec::new();
        let mut current: Option<ItemBuilder> = None;
        let mut tag = String::new();
        let mut saw_channel = false;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    match name.as_str() {
                        "item" => current = Some(ItemBuilder::default()),
                        "channel" => saw_channel = true,
                        _ => self.element(e, current.as_mut())?,
                    }
                    tag = name;
                }
                Ok(Event::Empty(ref e)) => self.element(e, current.as_mut())?,
                Ok(Event::Text(ref e)) => {
                    if let Some(item) = current.as_mut() {
                        let text = e.unescape().unwrap_or_default().trim().to_string();
                        item.set_text(&tag, text);
                    }
                }
                Ok(Event::CData(ref e)) => {
                    if let Some(item) = current.as_mut() {
                        let text = String::from_utf8_lossy(e).trim().to_string();
                        item.set_text(&tag, text);
                    }
                }
                Ok(Event::End(ref e)) => {
                    if e.name().as_ref() == b"item" {
                        if let Some(item) = current.take() {
                            match item.build(self.categories, now)? {
                                Some(release) => releases.push(release),
                                None => debug!(url = %response.request().url(), "Skipping item without title or link"),
                            }
                        }
                    }
                    tag.clear();
                }
                Ok(Event::Eof) => break,
                Err(e) if !response.is_success() => {
                    debug!(status = response.status(), error = %e, "Non-XML error page");
                    return Err(IndexerError::HttpStatus {
                        url: response.request().url().to_string(),
                        status: response.status(),
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Error parsing Newznab XML");
                    return Err(IndexerError::Parse(format!("XML parse error: {}", e)));
                }
                _ => {}
            }
        }

        if !response.is_success() {
            return Err(IndexerError::HttpStatus {
                url: response.request().url().to_string(),
                status: response.status(),
            });
        }
        if !saw_channel {
            return Err(IndexerError::parse("Response is not a Newznab feed"));
        }
        Ok(releases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::cats;
    use crate::criteria::SearchCriteria;
    use crate::request::IndexerRequest;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:newznab="http://www.newznab.com/DTD/2010/feeds/attributes/">
<channel>
  <title>example</title>
  <item>
    <title>The.Matrix.1999.1080p.BluRay.x264</title>
    <guid isPermaLink="true">https://nzb.test/details/abc</guid>
    <link>https://nzb.test/getnzb/abc.nzb&amp;i=1</link>
    <comments>https://nzb.test/details/abc#comments</comments>
    <pubDate>Sat, 01 Jun 2024 10:00:00 +0000</pubDate>
    <description><![CDATA[Neo wakes up]]></description>
    <enclosure url="https://nzb.test/getnzb/abc.nzb" length="100" type="application/x-nzb"/>
    <newznab:attr name="category" value="2000"/>
    <newznab:attr name="category" value="2040"/>
    <newznab:attr name="category" value="100040"/>
    <newznab:attr name="size" value="9126805504"/>
    <newznab:attr name="grabs" value="42"/>
    <newznab:attr name="files" value="87"/>
    <newznab:attr name="imdb" value="0133093"/>
  </item>
  <item>
    <title>No link here</title>
  </item>
</channel>
</rss>"#;

    fn indexer() -> Newznab {
        Newznab::with_settings(
            "nzb",
            NewznabSettings::new("https://nzb.test").with_api_key("secret"),
        )
        .unwrap()
    }

    fn response(status: u16, body: &str) -> IndexerResponse {
        let request = IndexerRequest::parse("https://nzb.test/api?t=search", HttpAccept::Xml).unwrap();
        IndexerResponse::new(request, status, body)
    }

    #[test]
    fn test_newznab_requires_absolute_base_url() {
        let err = Newznab::with_settings("nzb", NewznabSettings::new("nzb.test")).err().unwrap();
        assert!(matches!(err, IndexerError::Configuration { ref field, .. } if field == "base_url"));
    }

    #[test]
    fn test_newznab_from_definition() {
        let def = ProviderDefinition::new("nzb", "newznab")
            .with_settings(serde_json::json!({ "base_url": "https://nzb.test", "api_key": "k" }));
        let indexer = Newznab::new(&def).unwrap();
        assert_eq!(indexer.base_url(), "https://nzb.test");
        assert_eq!(indexer.settings.api_path, "/api");
    }

    #[test]
    fn test_basic_request_params() {
        let criteria: SearchCriteria = BasicSearchCriteria::new("ubuntu iso")
            .with_paging(50, 25)
            .with_categories(vec![cats::PC])
            .into();
        let chain = indexer().request_generator().generate(&criteria).unwrap();
        assert_eq!(chain.tier_count(), 1);

        let request = chain.requests().next().unwrap();
        assert_eq!(request.url().path(), "/api");
        assert_eq!(request.query_param("t").as_deref(), Some("search"));
        assert_eq!(request.query_param("apikey").as_deref(), Some("secret"));
        assert_eq!(request.query_param("q").as_deref(), Some("ubuntu iso"));
        assert_eq!(request.query_param("offset").as_deref(), Some("50"));
        assert_eq!(request.query_param("limit").as_deref(), Some("25"));
        assert_eq!(request.query_param("extended").as_deref(), Some("1"));
        assert_eq!(request.query_param("cat").as_deref(), Some("4000,4010,4020,4030,4050"));
        assert_eq!(request.query_param_count("offset"), 1);
        assert!(request.suppresses_http_errors());
    }

    #[test]
    fn test_movie_imdb_tier_precedes_text_tier() {
        let criteria: SearchCriteria = MovieSearchCriteria::new("The Matrix")
            .with_imdb_id("tt0133093")
            .into();
        let chain = indexer().request_generator().generate(&criteria).unwrap();
        let tiers = chain.into_tiers();
        assert_eq!(tiers.len(), 2);

        let first = &tiers[0].requests()[0];
        assert_eq!(first.query_param("t").as_deref(), Some("movie"));
        assert_eq!(first.query_param("imdbid").as_deref(), Some("0133093"));
        assert!(first.query_param("q").is_none());

        let second = &tiers[1].requests()[0];
        assert_eq!(second.query_param("q").as_deref(), Some("The Matrix"));
        assert!(second.query_param("imdbid").is_none());
    }

    #[test]
    fn test_movie_imdb_only_has_single_tier() {
        let criteria: SearchCriteria = MovieSearchCriteria::new("").with_imdb_id("133093").into();
        let chain = indexer().request_generator().generate(&criteria).unwrap();
        assert_eq!(chain.tier_count(), 1);
    }

    #[test]
    fn test_tv_request_has_episode_params() {
        let criteria: SearchCriteria = TvSearchCriteria::new("Chernobyl")
            .with_season(1)
            .with_episode("3")
            .into();
        let chain = indexer().request_generator().generate(&criteria).unwrap();
        let request = chain.requests().next().unwrap();
        assert_eq!(request.query_param("t").as_deref(), Some("tvsearch"));
        assert_eq!(request.query_param("q").as_deref(), Some("Chernobyl"));
        assert_eq!(request.query_param("season").as_deref(), Some("1"));
        assert_eq!(request.query_param("ep").as_deref(), Some("3"));
    }

    #[test]
    fn test_music_and_book_requests() {
        let indexer = indexer();
        let music: SearchCriteria = MusicSearchCriteria::new("").with_artist("Daft Punk").into();
        let chain = indexer.request_generator().generate(&music).unwrap();
        let request = chain.requests().next().unwrap();
        assert_eq!(request.query_param("t").as_deref(), Some("music"));
        assert_eq!(request.query_param("artist").as_deref(), Some("Daft Punk"));

        let book: SearchCriteria = BookSearchCriteria::new("").with_author("Le Guin").into();
        let chain = indexer.request_generator().generate(&book).unwrap();
        let request = chain.requests().next().unwrap();
        assert_eq!(request.query_param("t").as_deref(), Some("book"));
        assert_eq!(request.query_param("author").as_deref(), Some("Le Guin"));
    }

    #[test]
    fn test_parse_feed() {
        let indexer = indexer();
        let releases = indexer.response_parser().parse_response(&response(200, FEED)).unwrap();
        assert_eq!(releases.len(), 1);

        let release = &releases[0];
        assert_eq!(release.title, "The.Matrix.1999.1080p.BluRay.x264");
        assert_eq!(release.guid, "https://nzb.test/details/abc");
        assert_eq!(release.download_url, "https://nzb.test/getnzb/abc.nzb");
        assert_eq!(release.info_url.as_deref(), Some("https://nzb.test/details/abc#comments"));
        assert_eq!(release.description.as_deref(), Some("Neo wakes up"));
        assert_eq!(release.size, Some(9_126_805_504));
        assert_eq!(release.grabs, Some(42));
        assert_eq!(release.files, Some(87));
        assert_eq!(release.imdb_id, Some(133093));
        assert_eq!(release.categories, vec![cats::MOVIES, cats::MOVIES_HD]);
        assert_eq!(release.publish_date.to_rfc3339(), "2024-06-01T10:00:00+00:00");
    }

    #[test]
    fn test_parse_error_document() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?><error code="100" description="Incorrect user credentials"/>"#;
        let indexer = indexer();
        match indexer.response_parser().parse_response(&response(200, body)).unwrap_err() {
            IndexerError::ProviderApplication { code, message } => {
                assert_eq!(code, "100");
                assert_eq!(message, "Incorrect user credentials");
            }
            other => panic!("Expected ProviderApplication, got {:?}", other),
        };
    }

    #[test]
    fn test_parse_error_document_on_http_error() {
        let body = r#"<error code="101" description="Account suspended"/>"#;
        let indexer = indexer();
        let err = indexer.response_parser().parse_response(&response(403, body)).unwrap_err();
        assert!(matches!(err, IndexerError::ProviderApplication { .. }));
    }

    #[test]
    fn test_parse_http_error_without_document() {
        let indexer = indexer();
        let err = indexer
            .response_parser()
            .parse_response(&response(500, "<html><body>oops</body></html>"))
            .unwrap_err();
        assert!(matches!(err, IndexerError::HttpStatus { status: 500, .. }));
    }

    #[test]
    fn test_parse_empty_channel() {
        let body = r#"<rss><channel><title>x</title></channel></rss>"#;
        let indexer = indexer();
        assert!(indexer.response_parser().parse_response(&response(200, body)).unwrap().is_empty());
    }

    #[test]
    fn test_parse_unknown_standard_category_fails() {
        let body = r#"<rss xmlns:newznab="x"><channel><item>
            <title>t</title><link>https://nzb.test/1</link>
            <newznab:attr name="category" value="9999"/>
        </item></channel></rss>"#;
        let indexer = indexer();
        let err = indexer.response_parser().parse_response(&response(200, body)).unwrap_err();
        assert!(matches!(err, IndexerError::Mapping(ref token) if token == "9999"));
    }

    #[test]
    fn test_parse_nginx_error_page_is_http_status() {
        let body = "<html>\r\n<head><title>502 Bad Gateway</title></head>\r\n<body>\r\n<center><h1>502 Bad Gateway</h1></center>\r\n<hr><center>nginx</center>\r\n</body>\r\n</html>";
        let indexer = indexer();
        let err = indexer.response_parser().parse_response(&response(502, body)).unwrap_err();
        assert!(matches!(err, IndexerError::HttpStatus { status: 502, .. }));
    }

    #[test]
    fn test_parse_malformed_feed_on_success_is_parse_error() {
        let body = "<rss><channel><item><title>t</item></channel></rss>";
        let indexer = indexer();
        let err = indexer.response_parser().parse_response(&response(200, body)).unwrap_err();
        assert!(matches!(err, IndexerError::Parse(_)));
    }

    #[test]
    fn test_parse_undated_items_is_idempotent() {
        let body = r#"<rss><channel><item>
            <title>Undated</title><link>https://nzb.test/get/2</link>
        </item></channel></rss>"#;
        let indexer = indexer();
        let parser = indexer.response_parser();
        let first = parser.parse_response(&response(200, body)).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = parser.parse_response(&response(200, body)).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);

        let stamp = DateTime::parse_from_rfc3339("2024-06-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let stamped = parser
            .parse_response(&response(200, body).with_received_at(stamp))
            .unwrap();
        assert_eq!(stamped[0].publish_date, stamp);
    }
}
