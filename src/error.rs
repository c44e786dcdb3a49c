//! Error types for each stage of a run.
//!
//! Only two of these are fatal: [`ConfigError`] at startup and
//! [`PersistenceError`] when the history store cannot be written. Source and
//! publish failures are logged and the run continues.

use thiserror::Error;

/// A source adapter could not produce its batch for this run.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Transport-level failure talking to the upstream host.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered, but not with a success status.
    #[error("unexpected status {status} from {url}")]
    Status { url: String, status: u16 },

    /// The adapter did not finish inside its time budget.
    #[error("source '{source_name}' timed out after {secs}s")]
    Timeout { source_name: String, secs: u64 },

    /// The fetched document could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
}

/// A single destination did not accept a post.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Anything other than `201 Created`.
    #[error("destination '{destination}' answered {status}")]
    Rejected { destination: String, status: u16 },

    #[error("no destination registered under id '{0}'")]
    UnknownDestination(String),

    #[error("missing credentials for destination '{0}'")]
    MissingCredentials(String),
}

/// The history store could not be read or written.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error on {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// The configuration file or one of its rules is unusable.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}
