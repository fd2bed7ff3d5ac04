//! FlareSolverr challenge-solver proxy.
//!
//! Outbound requests are rewritten into solver commands posted to
//! `{host}/v1`; the solver fetches the page in a real browser and answers
//! with a JSON envelope that `post_response` unwraps back into an ordinary
//! response.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::definition::ProxyDefinition;
use crate::error::ValidationFailure;
use crate::fetcher::HttpDispatcher;
use crate::proxy::IndexerProxy;
use crate::request::{CachePolicy, HttpAccept, IndexerRequest};
use crate::response::IndexerResponse;
use crate::{IndexerError, Result};

fn default_request_timeout() -> u64 {
    60
}

/// Solver settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlareSolverrSettings {
    /// Solver base URL, e.g. `http://localhost:8191/`.
    pub host: String,
    /// Seconds the solver may spend on one challenge.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

#[derive(Debug, Deserialize)]
struct SolverEnvelope {
    status: String,
    #[serde(default)]
    message: String,
    solution: Option<Solution>,
}

#[derive(Debug, Deserialize)]
struct Solution {
    status: u16,
    #[serde(default)]
    headers: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    response: String,
    #[serde(default)]
    cookies: Vec<SolverCookie>,
}

#[derive(Debug, Deserialize)]
struct SolverCookie {
    name: String,
    value: String,
}

/// Proxy that solves anti-bot challenges through FlareSolverr.
#[derive(Debug, Clone)]
pub struct FlareSolverrProxy {
    definition: ProxyDefinition,
    settings: FlareSolverrSettings,
}

impl FlareSolverrProxy {
    pub fn new(definition: ProxyDefinition) -> Result<Self> {
        let settings: FlareSolverrSettings = definition.settings()?;
        if url::Url::parse(&settings.host).is_err() {
            return Err(IndexerError::config("host", "must be an absolute URL"));
        }
        Ok(Self {
            definition,
            settings,
        })
    }

    fn host(&self) -> &str {
        self.settings.host.trim_end_matches('/')
    }

    fn command(&self, request: &IndexerRequest) -> serde_json::Value {
        let max_timeout = self.settings.request_timeout * 1000;
        let mut command = if *request.method() == Method::POST {
            json!({
                "cmd": "request.post",
                "url": request.url().as_str(),
                "maxTimeout": max_timeout,
                "postData": request.body().unwrap_or_default(),
            })
        } else {
            json!({
                "cmd": "request.get",
                "url": request.url().as_str(),
                "maxTimeout": max_timeout,
            })
        };

        if let Some(jar) = request.cookie_jar().filter(|jar| !jar.is_empty()) {
            let cookies: Vec<_> = jar
                .cookies()
                .into_iter()
                .map(|(name, value)| json!({ "name": name, "value": value }))
                .collect();
            command["cookies"] = json!(cookies);
        }
        command
    }
}

#[async_trait]
impl IndexerProxy for FlareSolverrProxy {
    fn definition(&self) -> &ProxyDefinition {
        &self.definition
    }

    fn pre_request(&self, request: IndexerRequest) -> Result<IndexerRequest> {
        let command = self.command(&request);
        let mut solver = IndexerRequest::parse(&format!("{}/v1", self.host()), HttpAccept::Json)?
            .with_method(Method::POST)
            .with_body("application/json", command.to_string())
            .with_cache_policy(request.cache_policy());
        if request.suppresses_http_errors() {
            solver = solver.with_suppressed_http_errors();
        }
        debug!(url = %request.url(), solver = %solver.url(), "Routing request through FlareSolverr");
        Ok(solver)
    }

    fn handles_response(&self) -> bool {
        true
    }

    fn post_response(&self, response: IndexerResponse) -> Result<IndexerResponse> {
        let envelope: SolverEnvelope = match response.json() {
            Ok(envelope) => envelope,
            Err(_) if !response.is_success() => {
                return Err(IndexerError::HttpStatus {
                    url: response.request().url().to_string(),
                    status: response.status(),
                })
            }
            Err(e) => return Err(e),
        };

        if envelope.status != "ok" {
            warn!(status = %envelope.status, message = %envelope.message, "FlareSolverr failed");
            return Err(IndexerError::ProviderApplication {
                code: envelope.status,
                message: envelope.message,
            });
        }

        let solution = envelope
            .solution
            .ok_or_else(|| IndexerError::parse("FlareSolverr answer has no solution"))?;

        let headers = solution
            .headers
            .into_iter()
            .filter_map(|(name, value)| match value {
                serde_json::Value::String(s) => Some((name, s)),
                serde_json::Value::Number(n) => Some((name, n.to_string())),
                _ => None,
            })
            .collect();

        Ok(response
            .with_status(solution.status)
            .with_content(solution.response)
            .with_headers(headers)
            .with_cookies(solution.cookies.into_iter().map(|c| (c.name, c.value))))
    }

    async fn test(&self, dispatcher: &dyn HttpDispatcher) -> Option<ValidationFailure> {
        let request = match IndexerRequest::parse(&format!("{}/", self.host()), HttpAccept::Json) {
            Ok(request) => request.with_cache_policy(CachePolicy::Bypass),
            Err(e) => return Some(ValidationFailure::new("host", e.to_string())),
        };
        match dispatcher.dispatch(&request).await {
            Ok(response) if response.is_success() => None,
            Ok(response) => Some(ValidationFailure::new(
                "host",
                format!("FlareSolverr returned HTTP {}", response.status()),
            )),
            Err(e) => {
                debug!(proxy = %self.definition.id, error = %e, "FlareSolverr test failed");
                Some(ValidationFailure::new("host", "Unable to connect to FlareSolverr"))
            }
        }
    }
}
