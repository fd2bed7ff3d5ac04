//! Transport abstraction for executing indexer requests.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::request::IndexerRequest;
use crate::response::IndexerResponse;
use crate::Result;

/// Default user agent sent to indexers.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; a3s-indexer/0.1)";

/// Transport settings applied when a dispatcher is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpSettings {
    /// User agent header.
    pub user_agent: String,
    /// Per-request timeout.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

/// Executes one fully built request on the wire.
///
/// Implementations send the request as-is (including its gateway proxy and
/// cookie jar) and return the raw answer whatever its status; status policy,
/// caching and rate limiting belong to the caller.
#[async_trait]
pub trait HttpDispatcher: Send + Sync {
    async fn dispatch(&self, request: &IndexerRequest) -> Result<IndexerResponse>;
}
