use reqwest::StatusCode;

/// Errors surfaced by the LTA DB / File Catalog REST clients.
///
/// `Transport` and a 5xx `Status` are treated as retryable by [`crate::retry`];
/// everything else escalates to the caller on the first attempt.
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    #[error("transport error calling {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },
    #[error("failed to decode response body from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl RestError {
    pub fn is_retryable(&self) -> bool {
        match self {
            RestError::Transport { .. } => true,
            RestError::Status { status, .. } => status.is_server_error(),
            RestError::Decode { .. } => false,
        }
    }
}
