//! Failure taxonomy for directory and article fetches.
//!
//! Every fetch ends in one of five outcomes besides success. The split
//! matters to operators: a [`FetchError::NotFound`] is the site telling us a
//! page does not exist, while a [`FetchError::Parse`] means the page exists
//! but our extraction no longer matches its structure.
//!
//! | Variant | Retryable | Meaning |
//! |---------|-----------|---------|
//! | `Transport` | yes | connection reset, timeout, body read failure |
//! | `Status` | 5xx / 429 only | non-success HTTP status other than 404 |
//! | `NotFound` | no | HTTP 404, an expected "absent" signal |
//! | `Parse` | no | heading/body container missing, site drift |
//! | `Undated` | no | page parsed but no filing date could be chosen |

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A failed attempt to fetch or extract a page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport failure fetching {url}: {message}")]
    Transport { url: String, message: String },

    #[error("{url} not found (HTTP 404)")]
    NotFound { url: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("unexpected page structure at {url}: {reason}")]
    Parse { url: String, reason: String },

    #[error("no filing date for {url}: page asserts none and the URL carries none")]
    Undated { url: String },
}

/// Serializable summary of a [`FetchError`] variant, used in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transport,
    NotFound,
    HttpStatus,
    Parse,
    Undated,
    /// The record could not be written; never produced by a fetch.
    Write,
}

impl FetchError {
    pub fn transport(url: &str, err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("timed out: {err}")
        } else {
            err.to_string()
        };
        FetchError::Transport {
            url: url.to_string(),
            message,
        }
    }

    /// Map a non-success status to `NotFound` (404) or `Status`.
    pub fn from_status(url: &str, status: StatusCode) -> Self {
        if status == StatusCode::NOT_FOUND {
            FetchError::NotFound {
                url: url.to_string(),
            }
        } else {
            FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        }
    }

    pub fn parse(url: &str, reason: impl Into<String>) -> Self {
        FetchError::Parse {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Transient failures worth another attempt: transport errors, 5xx and 429.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport { .. } => true,
            FetchError::Status { status, .. } => *status >= 500 || *status == 429,
            FetchError::NotFound { .. } | FetchError::Parse { .. } | FetchError::Undated { .. } => false,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Transport { .. } => FailureKind::Transport,
            FetchError::NotFound { .. } => FailureKind::NotFound,
            FetchError::Status { .. } => FailureKind::HttpStatus,
            FetchError::Parse { .. } => FailureKind::Parse,
            FetchError::Undated { .. } => FailureKind::Undated,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            FetchError::Transport { url, .. }
            | FetchError::NotFound { url }
            | FetchError::Status { url, .. }
            | FetchError::Parse { url, .. }
            | FetchError::Undated { url } => url,
        }
    }
}
