//! Built-in proxy implementations and their registry.

pub mod flaresolverr;
pub mod http;

use std::sync::Arc;

use crate::definition::ProxyDefinition;
use crate::proxy::{IndexerProxy, ProxySelector};
use crate::{IndexerError, Result};

pub use flaresolverr::{FlareSolverrProxy, FlareSolverrSettings};
pub use http::{GatewayProxy, GatewaySettings, ProxyProtocol};

/// One registered proxy implementation.
#[derive(Debug, Clone, Copy)]
pub struct ProxyDescriptor {
    /// Value of `implementation` in a proxy definition.
    pub implementation: &'static str,
    pub name: &'static str,
    build: fn(ProxyDefinition) -> Result<Arc<dyn IndexerProxy>>,
}

fn build_gateway(definition: ProxyDefinition) -> Result<Arc<dyn IndexerProxy>> {
    Ok(Arc::new(GatewayProxy::new(definition)?))
}

fn build_flaresolverr(definition: ProxyDefinition) -> Result<Arc<dyn IndexerProxy>> {
    Ok(Arc::new(FlareSolverrProxy::new(definition)?))
}

/// Every proxy implementation known to the crate.
pub static PROXY_REGISTRY: &[ProxyDescriptor] = &[
    ProxyDescriptor {
        implementation: "http",
        name: "HTTP",
        build: build_gateway,
    },
    ProxyDescriptor {
        implementation: "socks4",
        name: "SOCKS4",
        build: build_gateway,
    },
    ProxyDescriptor {
        implementation: "socks5",
        name: "SOCKS5",
        build: build_gateway,
    },
    ProxyDescriptor {
        implementation: "flaresolverr",
        name: "FlareSolverr",
        build: build_flaresolverr,
    },
];

pub fn find_proxy(implementation: &str) -> Option<&'static ProxyDescriptor> {
    PROXY_REGISTRY
        .iter()
        .find(|d| d.implementation.eq_ignore_ascii_case(implementation))
}

/// Builds the proxy a definition describes.
pub fn build_proxy(definition: &ProxyDefinition) -> Result<Arc<dyn IndexerProxy>> {
    let descriptor = find_proxy(&definition.implementation).ok_or_else(|| {
        IndexerError::config(
            "implementation",
            format!("Unknown proxy implementation '{}'", definition.implementation),
        )
    })?;
    (descriptor.build)(definition.clone())
}

/// Builds a selector over every enabled definition.
pub fn build_selector(definitions: &[ProxyDefinition]) -> Result<ProxySelector> {
    let proxies = definitions
        .iter()
        .filter(|d| d.enabled)
        .map(build_proxy)
        .collect::<Result<Vec<_>>>()?;
    Ok(ProxySelector::new(proxies))
}
