//! Built-in indexer adapters and their registry.

mod binsearch;
mod command_api;
mod newznab;

use std::sync::Arc;

use crate::adapter::Indexer;
use crate::definition::ProviderDefinition;
use crate::{IndexerError, Result};

pub use binsearch::{BinSearch, BinSearchParser, BinSearchRequestGenerator, BinSearchSettings};
pub use command_api::{CommandApi, CommandApiParser, CommandApiSettings};
pub use newznab::{Newznab, NewznabParser, NewznabRequestGenerator, NewznabSettings};

/// One registered adapter.
#[derive(Debug, Clone, Copy)]
pub struct IndexerDescriptor {
    /// Value of `implementation` in a provider definition.
    pub implementation: &'static str,
    pub name: &'static str,
    /// Whether the adapter answers free-text searches.
    pub supports_search: bool,
    /// Whether an empty query returns the latest releases.
    pub supports_rss: bool,
    build: fn(&ProviderDefinition) -> Result<Arc<dyn Indexer>>,
}

impl IndexerDescriptor {
    pub fn build(&self, definition: &ProviderDefinition) -> Result<Arc<dyn Indexer>> {
        (self.build)(definition)
    }
}

fn build_binsearch(definition: &ProviderDefinition) -> Result<Arc<dyn Indexer>> {
    Ok(Arc::new(BinSearch::new(definition)?))
}

fn build_newznab(definition: &ProviderDefinition) -> Result<Arc<dyn Indexer>> {
    Ok(Arc::new(Newznab::new(definition)?))
}

fn build_command_api(definition: &ProviderDefinition) -> Result<Arc<dyn Indexer>> {
    Ok(Arc::new(CommandApi::new(definition)?))
}

/// Every adapter known to the crate.
pub static REGISTRY: &[IndexerDescriptor] = &[
    IndexerDescriptor {
        implementation: "binsearch",
        name: "BinSearch",
        supports_search: true,
        supports_rss: false,
        build: build_binsearch,
    },
    IndexerDescriptor {
        implementation: "newznab",
        name: "Newznab",
        supports_search: true,
        supports_rss: true,
        build: build_newznab,
    },
    IndexerDescriptor {
        implementation: "commandapi",
        name: "Command API",
        supports_search: true,
        supports_rss: false,
        build: build_command_api,
    },
];

pub fn find_indexer(implementation: &str) -> Option<&'static IndexerDescriptor> {
    REGISTRY
        .iter()
        .find(|d| d.implementation.eq_ignore_ascii_case(implementation))
}

/// Builds the adapter a definition describes.
pub fn build_indexer(definition: &ProviderDefinition) -> Result<Arc<dyn Indexer>> {
    let descriptor = find_indexer(&definition.implementation).ok_or_else(|| {
        IndexerError::config(
            "implementation",
            format!("Unknown indexer implementation '{}'", definition.implementation),
        )
    })?;
    descriptor.build(definition)
}
