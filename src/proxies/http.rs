//! HTTP and SOCKS gateway proxies.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::definition::ProxyDefinition;
use crate::error::ValidationFailure;
use crate::fetcher::HttpDispatcher;
use crate::proxy::IndexerProxy;
use crate::request::{CachePolicy, HttpAccept, IndexerRequest};
use crate::{IndexerError, Result};

/// Proxy protocol type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyProtocol {
    /// HTTP proxy
    #[default]
    Http,
    /// SOCKS4 proxy
    Socks4,
    /// SOCKS5 proxy
    Socks5,
}

impl ProxyProtocol {
    /// Protocol implied by a registry implementation id.
    pub fn from_implementation(implementation: &str) -> Option<Self> {
        match implementation {
            "http" => Some(Self::Http),
            "socks4" => Some(Self::Socks4),
            "socks5" => Some(Self::Socks5),
            _ => None,
        }
    }

    fn scheme(&self) -> &'static str {
        match self {
            ProxyProtocol::Http => "http",
            ProxyProtocol::Socks4 => "socks4",
            ProxyProtocol::Socks5 => "socks5",
        }
    }
}

fn default_test_url() -> String {
    "http://www.gstatic.com/generate_204".to_string()
}

/// Gateway settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewaySettings {
    /// Proxy host (IP or domain)
    pub host: String,
    /// Proxy port
    pub port: u16,
    /// Optional username for authentication
    #[serde(default)]
    pub username: Option<String>,
    /// Optional password for authentication
    #[serde(default)]
    pub password: Option<String>,
    /// URL fetched through the proxy by the connection test.
    #[serde(default = "default_test_url")]
    pub test_url: String,
}

impl GatewaySettings {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: None,
            password: None,
            test_url: default_test_url(),
        }
    }

    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(IndexerError::config("host", "must not be empty"));
        }
        if self.port == 0 {
            return Err(IndexerError::config("port", "must be between 1 and 65535"));
        }
        Ok(())
    }

    /// Returns the proxy URL string for `protocol`.
    pub fn url(&self, protocol: ProxyProtocol) -> String {
        let scheme = protocol.scheme();
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) if !user.is_empty() => format!(
                "{}://{}:{}@{}:{}",
                scheme,
                urlencoding::encode(user),
                urlencoding::encode(pass),
                self.host,
                self.port
            ),
            _ => format!("{}://{}:{}", scheme, self.host, self.port),
        }
    }
}

/// Routes requests through an HTTP or SOCKS gateway.
#[derive(Debug, Clone)]
pub struct GatewayProxy {
    definition: ProxyDefinition,
    protocol: ProxyProtocol,
    settings: GatewaySettings,
}

impl GatewayProxy {
    pub fn new(definition: ProxyDefinition) -> Result<Self> {
        let protocol = ProxyProtocol::from_implementation(&definition.implementation).ok_or_else(
            || {
                IndexerError::config(
                    "implementation",
                    format!("'{}' is not a gateway proxy", definition.implementation),
                )
            },
        )?;
        let settings: GatewaySettings = definition.settings()?;
        settings.validate()?;
        Ok(Self {
            definition,
            protocol,
            settings,
        })
    }

    pub fn protocol(&self) -> ProxyProtocol {
        self.protocol
    }

    pub fn proxy_url(&self) -> String {
        self.settings.url(self.protocol)
    }
}

#[async_trait]
impl IndexerProxy for GatewayProxy {
    fn definition(&self) -> &ProxyDefinition {
        &self.definition
    }

    fn pre_request(&self, request: IndexerRequest) -> Result<IndexerRequest> {
        Ok(request.with_proxy_url(self.proxy_url()))
    }

    async fn test(&self, dispatcher: &dyn HttpDispatcher) -> Option<ValidationFailure> {
        let request = match IndexerRequest::parse(&self.settings.test_url, HttpAccept::Any) {
            Ok(request) => request
                .with_cache_policy(CachePolicy::Bypass)
                .with_proxy_url(self.proxy_url()),
            Err(e) => return Some(ValidationFailure::new("test_url", e.to_string())),
        };

        match dispatcher.dispatch(&request).await {
            Ok(response) if response.is_success() => None,
            Ok(response) => Some(ValidationFailure::new(
                "host",
                format!("Proxy test request returned HTTP {}", response.status()),
            )),
            Err(e) => {
                debug!(proxy = %self.definition.id, error = %e, "Proxy test failed");
                Some(ValidationFailure::new("host", "Failed to test proxy"))
            }
        }
    }
}
