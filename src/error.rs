//! Error types for the indexer pipeline.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for indexer operations.
pub type Result<T> = std::result::Result<T, IndexerError>;

/// Errors that can occur while generating, dispatching or parsing indexer requests.
#[derive(Error, Debug)]
pub enum IndexerError {
    /// Missing or invalid settings.
    #[error("Invalid setting '{field}': {message}")]
    Configuration { field: String, message: String },

    /// Transport-level failure (connect, TLS, body read).
    #[error("Request to {url} failed: {message}")]
    Network { url: String, message: String },

    /// The remote answered with a non-success HTTP status.
    #[error("Request to {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// The request did not complete in time.
    #[error("Request to {0} timed out")]
    Timeout(String),

    /// The indexer is currently backed off by the status service.
    #[error("Indexer '{0}' is suspended until {1}")]
    Suspended(String, DateTime<Utc>),

    /// The remote endpoint declared failure with its own code and message.
    #[error("Provider error {code}: {message}")]
    ProviderApplication { code: String, message: String },

    /// A native category token has no canonical mapping.
    #[error("Unmapped native category '{0}'")]
    Mapping(String),

    /// The response did not have the expected structure.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// The criteria cannot be turned into requests.
    #[error("Invalid search criteria: {0}")]
    InvalidCriteria(String),

    /// URL parsing error.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Network,
    ProviderApplication,
    Mapping,
    Parsing,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Network => "network",
            ErrorKind::ProviderApplication => "provider",
            ErrorKind::Mapping => "mapping",
            ErrorKind::Parsing => "parsing",
        };
        f.write_str(name)
    }
}

impl IndexerError {
    /// Creates a configuration error bound to a settings field.
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Returns the taxonomy bucket of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            IndexerError::Configuration { .. }
            | IndexerError::InvalidCriteria(_)
            | IndexerError::UrlParse(_) => ErrorKind::Configuration,
            IndexerError::Network { .. }
            | IndexerError::HttpStatus { .. }
            | IndexerError::Timeout(_)
            | IndexerError::Suspended(..)
            | IndexerError::Other(_) => ErrorKind::Network,
            IndexerError::ProviderApplication { .. } => ErrorKind::ProviderApplication,
            IndexerError::Mapping(_) => ErrorKind::Mapping,
            IndexerError::Parse(_) => ErrorKind::Parsing,
        }
    }

    /// Whether the failure happened on the wire rather than in the payload.
    pub fn is_transport(&self) -> bool {
        self.kind() == ErrorKind::Network
    }
}

impl From<reqwest::Error> for IndexerError {
    fn from(err: reqwest::Error) -> Self {
        let url = err
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        if err.is_timeout() {
            return IndexerError::Timeout(url);
        }
        IndexerError::Network {
            url,
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for IndexerError {
    fn from(err: serde_json::Error) -> Self {
        IndexerError::Parse(format!("invalid JSON: {}", err))
    }
}

/// A failed connection test bound to the settings field that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    /// Settings field to highlight (e.g. `base_url`, `api_key`).
    pub field: String,
    /// Human readable message.
    pub message: String,
}

impl ValidationFailure {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Classifies an error raised while testing a connection.
    ///
    /// Transport failures land on `url_field` with a generic message, remote
    /// application failures land on `credential_field` with the remote text.
    pub fn from_error(err: &IndexerError, url_field: &str, credential_field: &str) -> Self {
        match err {
            IndexerError::ProviderApplication { message, .. } => {
                Self::new(credential_field, message.clone())
            }
            IndexerError::Configuration { field, message } => Self::new(field, message.clone()),
            e if e.is_transport() => Self::new(url_field, "Unable to complete indexer test"),
            e => Self::new("", format!("Unable to complete indexer test: {}", e)),
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}
