use crate::deletion::DeleteStage;
use thiserror::Error;

/// Failure talking to one of the external backends: blob storage, the
/// embedding index, the answer model, or the relational store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum IngestError {
    /// Bad input caught before any side effect: wrong MIME type, oversized
    /// or empty upload, unusable filename.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("document produced no text to index")]
    EmptyDocument,

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("upstream failure during ingestion: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("upstream failure while persisting the turn: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum DeleteError {
    /// A deletion step failed. `completed` is the last stage known to have
    /// fully succeeded; everything before it stays done (forward-only, no
    /// compensation).
    #[error("deletion halted after stage {completed:?}: {source}")]
    Stage {
        completed: DeleteStage,
        source: StoreError,
    },
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
