use std::time::Duration;

use thiserror::Error;

/// Classified failure of a single inference attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InferenceError {
    #[error("Vision endpoint unreachable at {endpoint}: {reason}")]
    Unreachable { endpoint: String, reason: String },

    #[error("Vision request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Malformed response from vision endpoint: {0}")]
    MalformedResponse(String),

    #[error("Vision endpoint returned HTTP {status}: {body}")]
    ServerError { status: u16, body: String },
}

impl InferenceError {
    /// Returns true if the error is likely transient and the request can be retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, InferenceError::MalformedResponse(_))
    }
}
