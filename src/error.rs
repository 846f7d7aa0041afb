//! Error taxonomy shared by the pipeline components.
//!
//! Transport and parse faults are converted into one of these kinds at the call
//! site, so nothing unstructured crosses a component boundary.

use thiserror::Error;

/// Failure reaching or reading the post source. Fatal to the run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
    #[error("account not found: {0}")]
    AccountNotFound(String),
    #[error("failed to obtain bearer token: {0}")]
    Auth(String),
    #[error("unexpected page markup: {0}")]
    Markup(String),
}

impl FetchError {
    /// Classify a reqwest error for the given URL.
    #[must_use]
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else if let Some(status) = err.status() {
            Self::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            Self::Transport {
                url: url.to_string(),
                source: err,
            }
        }
    }

    /// Whether the failure was a timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// A single post payload that could not be turned into a record.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed post: {reason}")]
pub struct MalformedPost {
    pub reason: String,
}

impl MalformedPost {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Webhook unreachable or rejected the message.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("webhook request timed out")]
    Timeout,
    #[error("webhook request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("webhook rejected message (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err)
        }
    }
}

/// Failure persisting dedup state.
///
/// Problems on the load side never surface as this error; they are recovered
/// as empty state.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("state file I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Error returned by a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
    #[error("failed to persist dedup state: {0}")]
    State(#[from] StateError),
}
