use crate::config::ValidationError;
use std::fmt;
use thiserror::Error;

/// Result type alias for release notes operations
pub type Result<T, E = ReleaseNotesError> = std::result::Result<T, E>;

/// The external services the pipeline talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    Gocd,
    Jira,
    Confluence,
}

impl Upstream {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Upstream::Gocd => "gocd",
            Upstream::Jira => "jira",
            Upstream::Confluence => "confluence",
        }
    }
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Upstream::Gocd => "GoCD",
            Upstream::Jira => "Jira",
            Upstream::Confluence => "Confluence",
        })
    }
}

/// Errors that can occur while building and publishing release notes
#[derive(Error, Debug)]
pub enum ReleaseNotesError {
    /// Missing or invalid query parameter.
    #[error("{0}")]
    BadRequest(String),

    #[error("{upstream} rejected the configured credentials ({status})")]
    Unauthorized { upstream: Upstream, status: u16 },

    /// Body is not JSON or does not have the expected shape.
    #[error("malformed {upstream} response: {reason}")]
    MalformedResponse { upstream: Upstream, reason: String },

    #[error("{upstream} returned unexpected status {status}: {body}")]
    UnexpectedStatus {
        upstream: Upstream,
        status: u16,
        body: String,
    },

    #[error("failed to publish to Confluence ({status}): {body}")]
    PublishFailed { status: u16, body: String },

    #[error("{upstream} request failed: {source}")]
    Transport {
        upstream: Upstream,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid {upstream} endpoint: {reason}")]
    InvalidEndpoint { upstream: Upstream, reason: String },

    #[error("invalid configuration: {0}")]
    Config(#[from] ValidationError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReleaseNotesError {
    pub(crate) fn transport(upstream: Upstream) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| ReleaseNotesError::Transport { upstream, source }
    }

    pub(crate) fn malformed(upstream: Upstream, reason: impl Into<String>) -> Self {
        ReleaseNotesError::MalformedResponse {
            upstream,
            reason: reason.into(),
        }
    }
}
