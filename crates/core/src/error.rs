use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{backend} did not answer within {timeout_ms} ms")]
    Timeout { backend: String, timeout_ms: u64 },

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("invalid search request: {0}")]
    InvalidRequest(String),
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("search history {0} not found")]
    NotFound(uuid::Uuid),
}

pub type Result<T, E = SearchError> = std::result::Result<T, E>;
