//! TOML configuration: client settings plus indexer and proxy definitions.
//!
//! ```toml
//! [client]
//! timeout_secs = 20
//! min_request_interval_ms = 2000
//!
//! [[indexers]]
//! id = "binsearch"
//! implementation = "binsearch"
//! tags = ["vpn"]
//!
//! [[proxies]]
//! id = "vpn"
//! implementation = "socks5"
//! tags = ["vpn"]
//! settings = { host = "127.0.0.1", port = 1080 }
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::adapter::Indexer;
use crate::cache::ResponseCache;
use crate::definition::{ProviderDefinition, ProxyDefinition};
use crate::dispatch::IndexerHttpClient;
use crate::fetcher::{HttpSettings, DEFAULT_USER_AGENT};
use crate::fetcher_http::ReqwestDispatcher;
use crate::health::BackoffStatusService;
use crate::{indexers, proxies, IndexerError, Result};

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

/// `[client]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSettings {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Lifetime of cached responses; 0 disables caching.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Default spacing between calls to one indexer.
    #[serde(default)]
    pub min_request_interval_ms: u64,
    /// Back off failing indexers.
    #[serde(default = "default_true")]
    pub backoff: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
            min_request_interval_ms: 0,
            backoff: true,
        }
    }
}

impl ClientSettings {
    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            user_agent: self.user_agent.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub client: ClientSettings,
    #[serde(default)]
    pub indexers: Vec<ProviderDefinition>,
    #[serde(default)]
    pub proxies: Vec<ProxyDefinition>,
}

impl RelayConfig {
    /// Reads and validates a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            IndexerError::config("config", format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml(&text)?;
        debug!(
            path = %path.display(),
            indexers = config.indexers.len(),
            proxies = config.proxies.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parses and validates TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| IndexerError::config("config", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects duplicate ids and unknown implementations.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for def in &self.indexers {
            if def.id.trim().is_empty() {
                return Err(IndexerError::config("indexers.id", "must not be empty"));
            }
            if !seen.insert(def.id.as_str()) {
                return Err(IndexerError::config(
                    "indexers.id",
                    format!("Duplicate indexer id '{}'", def.id),
                ));
            }
            if indexers::find_indexer(&def.implementation).is_none() {
                return Err(IndexerError::config(
                    format!("indexers.{}.implementation", def.id),
                    format!("Unknown indexer implementation '{}'", def.implementation),
                ));
            }
        }

        let mut seen = HashSet::new();
        for def in &self.proxies {
            if !seen.insert(def.id.as_str()) {
                return Err(IndexerError::config(
                    "proxies.id",
                    format!("Duplicate proxy id '{}'", def.id),
                ));
            }
            if proxies::find_proxy(&def.implementation).is_none() {
                return Err(IndexerError::config(
                    format!("proxies.{}.implementation", def.id),
                    format!("Unknown proxy implementation '{}'", def.implementation),
                ));
            }
        }
        Ok(())
    }

    pub fn indexer(&self, id: &str) -> Option<&ProviderDefinition> {
        self.indexers.iter().find(|d| d.id == id)
    }

    /// Builds the shared HTTP client: reqwest transport, proxies, cache,
    /// rate limiting and backoff.
    pub fn build_client(&self) -> Result<IndexerHttpClient> {
        let dispatcher = ReqwestDispatcher::new(self.client.http_settings())?;
        let mut client = IndexerHttpClient::new(Arc::new(dispatcher))
            .with_proxies(proxies::build_selector(&self.proxies)?)
            .with_cache(ResponseCache::new(Duration::from_secs(self.client.cache_ttl_secs)))
            .with_min_request_interval(Duration::from_millis(self.client.min_request_interval_ms))
            .with_timeout(Duration::from_secs(self.client.timeout_secs));
        if self.client.backoff {
            client = client.with_status_service(Arc::new(BackoffStatusService::default()));
        }
        Ok(client)
    }

    /// Builds every enabled indexer, paired with its definition.
    pub fn build_indexers(&self) -> Result<Vec<(Arc<dyn Indexer>, ProviderDefinition)>> {
        self.indexers
            .iter()
            .filter(|d| d.enabled)
            .map(|d| Ok((indexers::build_indexer(d)?, d.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[client]
user_agent = "test-agent"
timeout_secs = 10
min_request_interval_ms = 1500

[[indexers]]
id = "bs"
implementation = "binsearch"
tags = ["vpn"]

[[indexers]]
id = "nzb"
name = "My Newznab"
implementation = "newznab"
enabled = false
min_request_interval_ms = 5000
settings = { base_url = "https://nzb.test", api_key = "secret" }

[[proxies]]
id = "vpn"
implementation = "socks5"
tags = ["vpn"]
settings = { host = "127.0.0.1", port = 1080 }
"#;

    #[test]
    fn test_from_toml() {
        let config = RelayConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.client.user_agent, "test-agent");
        assert_eq!(config.client.timeout_secs, 10);
        assert_eq!(config.client.cache_ttl_secs, 300);
        assert!(config.client.backoff);
        assert_eq!(config.indexers.len(), 2);
        assert!(config.indexers[0].tags.contains("vpn"));

        let nzb = config.indexer("nzb").unwrap();
        assert!(!nzb.enabled);
        assert_eq!(nzb.display_name(), "My Newznab");
        assert_eq!(nzb.min_request_interval(), Some(Duration::from_millis(5000)));
    }

    #[test]
    fn test_empty_config() {
        let config = RelayConfig::from_toml("").unwrap();
        assert_eq!(config.client, ClientSettings::default());
        assert!(config.indexers.is_empty());
    }

    #[test]
    fn test_duplicate_indexer_id() {
        let text = r#"
[[indexers]]
id = "a"
implementation = "binsearch"

[[indexers]]
id = "a"
implementation = "binsearch"
"#;
        let err = RelayConfig::from_toml(text).unwrap_err();
        assert!(err.to_string().contains("Duplicate indexer id 'a'"));
    }

    #[test]
    fn test_unknown_implementation() {
        let text = r#"
[[proxies]]
id = "x"
implementation = "tor"
"#;
        let err = RelayConfig::from_toml(text).unwrap_err();
        assert!(matches!(err, IndexerError::Configuration { ref field, .. } if field == "proxies.x.implementation"));
    }

    #[test]
    fn test_invalid_toml() {
        let err = RelayConfig::from_toml("[client\n").unwrap_err();
        assert!(matches!(err, IndexerError::Configuration { ref field, .. } if field == "config"));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(RelayConfig::load("/nonexistent/a3s-indexer.toml").is_err());
    }

    #[test]
    fn test_build_client_and_indexers() {
        let config = RelayConfig::from_toml(SAMPLE).unwrap();
        let client = config.build_client().unwrap();
        assert_eq!(client.proxies().len(), 1);

        let built = config.build_indexers().unwrap();
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].1.id, "bs");
        assert!(client.proxy_for(&built[0].1).is_some());
    }
}
