//! Fetch error types.

use std::fmt;

use renraku_core::CoreError;
use reqwest::StatusCode;
use thiserror::Error;

use crate::runner::RunStage;

// ============================================================================
// Portal Error
// ============================================================================

/// Error from an exchange with the portal.
#[derive(Debug, Error)]
pub enum PortalError {
    /// Request could not be sent or the response could not be read.
    #[error("failed to send HTTP request: {0}")]
    Request(#[from] reqwest::Error),

    /// The portal answered with a status outside 2xx/3xx.
    #[error("got HTTP error code {status}: {body}")]
    Status {
        /// Response status.
        status: StatusCode,
        /// Response headers, one `name: value` per line.
        headers: String,
        /// Response body, truncated.
        body: String,
    },

    /// The request URL could not be built.
    #[error("invalid portal URL: {0}")]
    InvalidUrl(String),
}

impl PortalError {
    /// Returns the HTTP status if the portal answered.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Request(e) => e.status(),
            Self::InvalidUrl(_) => None,
        }
    }
}

// ============================================================================
// Store Error
// ============================================================================

/// Error while reading the save-data document.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No access token could be obtained.
    #[error("no credentials for the document store: {0}")]
    NoCredentials(String),

    /// Token endpoint rejected the refresh.
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// The store could not be reached or answered with an error.
    #[error("document store unavailable: {0}")]
    Unavailable(String),

    /// Document does not exist.
    #[error("document {collection}/{document} not found")]
    NotFound {
        /// Collection name.
        collection: String,
        /// Document ID.
        document: String,
    },

    /// Document exists but does not have the record's shape.
    #[error("failed to convert document: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StoreError::Unavailable(format!("request timed out: {err}"))
        } else if err.is_connect() {
            StoreError::Unavailable(format!("connection failed: {err}"))
        } else {
            StoreError::Unavailable(err.to_string())
        }
    }
}

// ============================================================================
// Record Error
// ============================================================================

/// Error while producing the day's record.
#[derive(Debug, Error)]
pub enum RecordError {
    /// Reading the stored document failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The record itself is invalid (e.g. malformed temperature).
    #[error(transparent)]
    Core(#[from] CoreError),
}

// ============================================================================
// Run Error
// ============================================================================

/// Terminal failure of a submission run.
#[derive(Debug, Error)]
pub enum RunError {
    /// Login was rejected or could not be sent.
    #[error("login failed: {0}")]
    Auth(#[source] PortalError),

    /// The day's record could not be produced.
    #[error("data fetch failed: {0}")]
    DataFetch(#[from] RecordError),

    /// Registration was rejected or could not be sent.
    #[error("submission failed: {0}")]
    Submission(#[source] PortalError),

    /// The run was cancelled before finishing.
    #[error("run cancelled while {0}")]
    Cancelled(CancelledAt),
}

impl RunError {
    /// The stage the run had reached when it failed.
    pub fn stage(&self) -> RunStage {
        match self {
            Self::Auth(_) => RunStage::Init,
            Self::DataFetch(_) => RunStage::LoggedIn,
            Self::Submission(_) => RunStage::RecordReady,
            Self::Cancelled(at) => at.0,
        }
    }
}

/// Stage that was in progress when a run was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelledAt(pub RunStage);

impl fmt::Display for CancelledAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let doing = match self.0 {
            RunStage::Init => "logging in",
            RunStage::LoggedIn => "fetching the record",
            RunStage::RecordReady => "submitting",
            RunStage::Submitted => "finishing",
        };
        f.write_str(doing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_message() {
        let err = RunError::Cancelled(CancelledAt(RunStage::LoggedIn));
        assert_eq!(err.to_string(), "run cancelled while fetching the record");
        assert_eq!(err.stage(), RunStage::LoggedIn);
    }

    #[test]
    fn test_status_error_message() {
        let err = PortalError::Status {
            status: StatusCode::FORBIDDEN,
            headers: String::new(),
            body: "denied".to_string(),
        };
        assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
        assert_eq!(
            RunError::Auth(err).to_string(),
            "login failed: got HTTP error code 403 Forbidden: denied"
        );
    }
}
