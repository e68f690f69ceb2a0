use thiserror::Error;

/// Errors surfaced by the news client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to decode response body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected response format: {0}")]
    Format(String),

    #[error("request failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("initial page load timed out")]
    InitialLoadTimeout,
}

impl Error {
    /// Whether a retry could plausibly succeed. Connection failures,
    /// request timeouts, and 5xx responses are transient; 4xx responses
    /// and malformed bodies are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(e) => e.status().map_or(true, |status| status.is_server_error()),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
