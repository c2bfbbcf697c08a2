use serde::Serialize;
use thiserror::Error;

/// A review request that failed shape or invariant checks.
///
/// Raised before any side effect; maps to a client error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {reason}", kind = Self::KIND)]
pub struct ValidationError {
    reason: String,
}

impl ValidationError {
    pub const KIND: &'static str = "AgentReviewValidationError";

    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        Self::KIND
    }

    /// HTTP-equivalent status.
    pub fn status(&self) -> u16 {
        400
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Structured body for callers that surface the error over a wire.
    pub fn body(&self) -> ValidationErrorBody<'_> {
        ValidationErrorBody {
            error: self.kind(),
            status: self.status(),
            reason: &self.reason,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ValidationErrorBody<'a> {
    pub error: &'static str,
    pub status: u16,
    pub reason: &'a str,
}

/// Failure talking to the decision service.
#[derive(Error, Debug)]
pub enum TransportError {
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("review call timed out")]
    Timeout,
    #[error("service returned no text")]
    EmptyResponse,
}
