//! Indexer and proxy definitions as stored in configuration.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{IndexerError, Result};

fn default_enabled() -> bool {
    true
}

fn empty_settings() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

fn typed_settings<T: DeserializeOwned>(owner: &str, settings: &serde_json::Value) -> Result<T> {
    serde_json::from_value(settings.clone())
        .map_err(|e| IndexerError::config(format!("{}.settings", owner), e.to_string()))
}

/// Configuration of one indexer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDefinition {
    /// Stable identifier, also the rate-limit key.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Registry id of the adapter (e.g. `binsearch`).
    pub implementation: String,
    /// Tags used to route requests through proxies.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Adapter-specific settings.
    #[serde(default = "empty_settings")]
    pub settings: serde_json::Value,
    /// Minimum delay between two calls, overriding the client default.
    #[serde(default)]
    pub min_request_interval_ms: Option<u64>,
}

impl ProviderDefinition {
    pub fn new(id: impl Into<String>, implementation: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            implementation: implementation.into(),
            tags: BTreeSet::new(),
            enabled: true,
            settings: empty_settings(),
            min_request_interval_ms: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_settings(mut self, settings: serde_json::Value) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_min_request_interval(mut self, interval: Duration) -> Self {
        self.min_request_interval_ms = Some(interval.as_millis() as u64);
        self
    }

    pub fn min_request_interval(&self) -> Option<Duration> {
        self.min_request_interval_ms.map(Duration::from_millis)
    }

    /// Deserializes the adapter settings into their typed form.
    pub fn settings<T: DeserializeOwned>(&self) -> Result<T> {
        typed_settings(&self.id, &self.settings)
    }

    /// Label for logs and warnings.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// Configuration of one proxy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Registry id of the proxy (e.g. `http`, `flaresolverr`).
    pub implementation: String,
    /// An indexer is routed through this proxy when their tags intersect.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Lower values are tried first; ties are broken by id.
    #[serde(default)]
    pub order: i32,
    #[serde(default = "empty_settings")]
    pub settings: serde_json::Value,
}

impl ProxyDefinition {
    pub fn new(id: impl Into<String>, implementation: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            implementation: implementation.into(),
            tags: BTreeSet::new(),
            enabled: true,
            order: 0,
            settings: empty_settings(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_settings(mut self, settings: serde_json::Value) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings<T: DeserializeOwned>(&self) -> Result<T> {
        typed_settings(&self.id, &self.settings)
    }

    /// Whether this proxy applies to an indexer carrying `tags`.
    pub fn matches(&self, tags: &BTreeSet<String>) -> bool {
        !self.tags.is_disjoint(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct KeySettings {
        api_key: String,
        #[serde(default)]
        api_path: Option<String>,
    }

    #[test]
    fn test_provider_definition_defaults() {
        let def = ProviderDefinition::new("binsearch", "binsearch");
        assert_eq!(def.display_name(), "binsearch");
        assert!(def.enabled);
        assert!(def.tags.is_empty());
        assert!(def.min_request_interval().is_none());
    }

    #[test]
    fn test_provider_definition_typed_settings() {
        let def = ProviderDefinition::new("nz", "newznab")
            .with_settings(json!({ "api_key": "secret" }));
        let settings: KeySettings = def.settings().unwrap();
        assert_eq!(settings.api_key, "secret");
        assert!(settings.api_path.is_none());
    }

    #[test]
    fn test_provider_definition_missing_setting_is_config_error() {
        let def = ProviderDefinition::new("nz", "newznab");
        let err = def.settings::<KeySettings>().unwrap_err();
        match err {
            IndexerError::Configuration { field, .. } => assert_eq!(field, "nz.settings"),
            other => panic!("Expected Configuration, got {:?}", other),
        }
    }

    #[test]
    fn test_provider_definition_interval() {
        let def = ProviderDefinition::new("a", "binsearch")
            .with_min_request_interval(Duration::from_millis(250));
        assert_eq!(def.min_request_interval(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_proxy_definition_matches() {
        let proxy = ProxyDefinition::new("fs", "flaresolverr").with_tag("cloudflare");
        let tagged = ProviderDefinition::new("a", "binsearch").with_tag("cloudflare").with_tag("x");
        let untagged = ProviderDefinition::new("b", "binsearch");
        assert!(proxy.matches(&tagged.tags));
        assert!(!proxy.matches(&untagged.tags));
    }

    #[test]
    fn test_definition_deserialize_toml() {
        let def: ProviderDefinition = toml::from_str(
            r#"
            id = "nzb"
            implementation = "newznab"
            tags = ["usenet"]
            min_request_interval_ms = 1000

            [settings]
            api_key = "k"
            "#,
        )
        .unwrap();
        assert!(def.enabled);
        assert!(def.tags.contains("usenet"));
        assert_eq!(def.settings["api_key"], "k");
        assert_eq!(def.min_request_interval(), Some(Duration::from_secs(1)));
    }
}
