//! Connection tests of the built-in indexers against mock servers.

use std::sync::Arc;
use std::time::Duration;

use a3s_indexer::fetcher::HttpSettings;
use a3s_indexer::fetcher_http::ReqwestDispatcher;
use a3s_indexer::indexers::{BinSearch, CommandApi, CommandApiSettings, Newznab, NewznabSettings};
use a3s_indexer::{Indexer, IndexerHttpClient, ProviderDefinition};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> IndexerHttpClient {
    let dispatcher = ReqwestDispatcher::new(HttpSettings::default()).unwrap();
    IndexerHttpClient::new(Arc::new(dispatcher)).with_timeout(Duration::from_secs(5))
}

const EMPTY_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>nzb</title></channel></rss>"#;

#[tokio::test]
async fn test_newznab_valid_key_passes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .and(query_param("t", "search"))
        .and(query_param("apikey", "good"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(EMPTY_FEED))
        .expect(1)
        .mount(&server)
        .await;

    let indexer = Newznab::with_settings("nzb", NewznabSettings::new(server.uri()).with_api_key("good")).unwrap();
    let definition = ProviderDefinition::new("nzb", "newznab");
    assert_eq!(indexer.test_connection(&client(), &definition).await, None);
}

#[tokio::test]
async fn test_newznab_wrong_key_reports_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(401).set_body_string(
            r#"<?xml version="1.0" encoding="UTF-8"?><error code="100" description="Incorrect user credentials"/>"#,
        ))
        .mount(&server)
        .await;

    let indexer = Newznab::with_settings("nzb", NewznabSettings::new(server.uri()).with_api_key("bad")).unwrap();
    let definition = ProviderDefinition::new("nzb", "newznab");
    let failure = indexer.test_connection(&client(), &definition).await.unwrap();
    assert_eq!(failure.field, "api_key");
    assert_eq!(failure.message, "Incorrect user credentials");
}

#[tokio::test]
async fn test_unreachable_indexer_reports_base_url() {
    let indexer = Newznab::with_settings("nzb", NewznabSettings::new("http://127.0.0.1:9")).unwrap();
    let definition = ProviderDefinition::new("nzb", "newznab");
    let failure = indexer.test_connection(&client(), &definition).await.unwrap();
    assert_eq!(failure.field, "base_url");
    assert_eq!(failure.message, "Unable to complete indexer test");
}

#[tokio::test]
async fn test_binsearch_connection_bypasses_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("max", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
        .expect(2)
        .mount(&server)
        .await;

    let indexer = BinSearch::with_base_url("BinSearch", &server.uri()).unwrap();
    let definition = ProviderDefinition::new("bs", "binsearch");
    let client = client();
    assert_eq!(indexer.test_connection(&client, &definition).await, None);
    assert_eq!(indexer.test_connection(&client, &definition).await, None);
}

#[tokio::test]
async fn test_command_api_version_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .and(query_param("cmd", "getVersion"))
        .and(query_param("apikey", "k"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "version": "2.3.1" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let indexer = CommandApi::with_settings("api", CommandApiSettings::new(server.uri(), "k")).unwrap();
    let definition = ProviderDefinition::new("api", "commandapi");
    assert_eq!(indexer.test_connection(&client(), &definition).await, None);
}

#[tokio::test]
async fn test_command_api_rejected_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .and(query_param("cmd", "getVersion"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "success": false,
            "error": { "code": 403, "message": "API key is disabled" }
        })))
        .mount(&server)
        .await;

    let indexer = CommandApi::with_settings("api", CommandApiSettings::new(server.uri(), "old")).unwrap();
    let definition = ProviderDefinition::new("api", "commandapi");
    let failure = indexer.test_connection(&client(), &definition).await.unwrap();
    assert_eq!(failure.field, "api_key");
    assert_eq!(failure.message, "API key is disabled");
}

#[tokio::test]
async fn test_command_api_html_error_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .mount(&server)
        .await;

    let indexer = CommandApi::with_settings("api", CommandApiSettings::new(server.uri(), "k")).unwrap();
    let definition = ProviderDefinition::new("api", "commandapi");
    let failure = indexer.test_connection(&client(), &definition).await.unwrap();
    assert_eq!(failure.field, "base_url");
}
