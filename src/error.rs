//! Error taxonomy for the catalog sync job and the store client.

use reqwest::StatusCode;
use thiserror::Error;

/// Failures surfaced by the catalog sync job.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Required connection settings are absent or invalid. Raised before any I/O.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The catalog API could not be reached, or answered with a non-success status.
    #[error("catalog source unavailable on page {page}: {reason}")]
    SourceUnavailable { page: u32, reason: String },

    /// The catalog API answered, but with GraphQL errors or an unexpected payload.
    #[error("catalog source protocol error on page {page}: {reason}")]
    SourceProtocol { page: u32, reason: String },

    /// The store rejected (or never received) the page's upsert.
    #[error("failed to persist page {page}")]
    Persistence {
        page: u32,
        #[source]
        source: StoreError,
    },
}

impl SyncError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Page the failure happened on, if it happened inside the page loop.
    pub fn page(&self) -> Option<u32> {
        match self {
            Self::Configuration(_) => None,
            Self::SourceUnavailable { page, .. }
            | Self::SourceProtocol { page, .. }
            | Self::Persistence { page, .. } => Some(*page),
        }
    }
}

/// Failures surfaced by the store client and the data-access functions.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success response from the store, decoded from its error body when possible.
    #[error("store rejected request (status {status}): {message}")]
    Rejected {
        status: StatusCode,
        message: String,
        code: Option<String>,
        details: Option<String>,
        hint: Option<String>,
    },

    #[error("failed to decode store response: {0}")]
    Decode(String),

    /// Rejected locally, before any request was sent.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl StoreError {
    /// Transport failures are the only ones worth retrying on reads.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            Self::Transport(e) => e.status(),
            _ => None,
        }
    }
}
