use thiserror::Error;

/// Failure of a single backend fetch
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid timestamp {0:?} in response")]
    InvalidTimestamp(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("unsupported result type {0:?}, expected streams")]
    UnsupportedResult(String),
}
