//! HTTP dispatcher using reqwest.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{ACCEPT, COOKIE, SET_COOKIE};
use reqwest::{Client, Proxy as ReqwestProxy};
use tracing::debug;

use crate::fetcher::{HttpDispatcher, HttpSettings};
use crate::request::IndexerRequest;
use crate::response::IndexerResponse;
use crate::session::parse_set_cookie;
use crate::{IndexerError, Result};

/// Dispatcher backed by reqwest.
///
/// Requests routed through a gateway proxy get a client built for that
/// proxy; clients are kept per proxy URL and reused.
pub struct ReqwestDispatcher {
    settings: HttpSettings,
    client: Client,
    proxied: Mutex<HashMap<String, Client>>,
}

impl ReqwestDispatcher {
    pub fn new(settings: HttpSettings) -> Result<Self> {
        let client = build_client(&settings, None)?;
        Ok(Self {
            settings,
            client,
            proxied: Mutex::new(HashMap::new()),
        })
    }

    /// Creates a dispatcher with a custom reqwest client for direct requests.
    pub fn with_client(settings: HttpSettings, client: Client) -> Self {
        Self {
            settings,
            client,
            proxied: Mutex::new(HashMap::new()),
        }
    }

    fn client_for(&self, proxy_url: Option<&str>) -> Result<Client> {
        let Some(proxy_url) = proxy_url else {
            return Ok(self.client.clone());
        };
        let mut proxied = self.proxied.lock();
        if let Some(client) = proxied.get(proxy_url) {
            return Ok(client.clone());
        }
        debug!(proxy = proxy_url, "Building proxied HTTP client");
        let client = build_client(&self.settings, Some(proxy_url))?;
        proxied.insert(proxy_url.to_string(), client.clone());
        Ok(client)
    }
}

fn build_client(settings: &HttpSettings, proxy_url: Option<&str>) -> Result<Client> {
    let mut builder = Client::builder()
        .user_agent(settings.user_agent.as_str())
        .timeout(settings.timeout);

    if let Some(proxy_url) = proxy_url {
        let proxy = ReqwestProxy::all(proxy_url)
            .map_err(|e| IndexerError::config("proxy_url", format!("Failed to create proxy: {}", e)))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| IndexerError::Other(format!("Failed to create HTTP client: {}", e)))
}

#[async_trait]
impl HttpDispatcher for ReqwestDispatcher {
    async fn dispatch(&self, request: &IndexerRequest) -> Result<IndexerResponse> {
        let client = self.client_for(request.proxy_url())?;

        let mut builder = client
            .request(request.method().clone(), request.url().clone())
            .header(ACCEPT, request.accept().header_value());
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.headers().contains_key("cookie") {
            if let Some(cookie) = request.cookie_jar().and_then(|jar| jar.header_value()) {
                builder = builder.header(COOKIE, cookie);
            }
        }
        if let Some(body) = request.body() {
            builder = builder.body(body.to_string());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();

        let mut headers = BTreeMap::new();
        let mut cookies = Vec::new();
        for (name, value) in response.headers() {
            let Ok(value) = value.to_str() else {
                continue;
            };
            if name == SET_COOKIE {
                cookies.extend(parse_set_cookie(value));
            }
            headers.insert(name.as_str().to_string(), value.to_string());
        }

        let content = response.text().await?;
        debug!(url = %request.url(), status, bytes = content.len(), "Dispatched request");

        Ok(IndexerResponse::new(request.clone(), status, content)
            .with_headers(headers)
            .with_cookies(cookies))
    }
}
