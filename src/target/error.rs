use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur while talking to the identity service.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("target HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("target returned status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("failed to decode target response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl TargetError {
    pub fn status(status: StatusCode, body: String) -> Self {
        TargetError::Status { status, body }
    }
}
