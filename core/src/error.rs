use crate::PaperId;
use thiserror::Error;

/// Errors surfaced by the indexing engine.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Document text was neither raw text nor a token sequence, or a token was blank.
    #[error("invalid document input: {0}")]
    InvalidInput(String),

    /// No paper id could be derived from the document key.
    #[error("cannot resolve a paper id from document key {key:?}")]
    UnresolvedPaperId { key: String },

    #[error("document not found: {0}")]
    DocumentNotFound(String),

    /// A single document's transactional save failed and was rolled back.
    #[error("failed to persist document {key} (paper {paper_id:?}): {source}")]
    Persist {
        key: String,
        paper_id: Option<PaperId>,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Errors from the term-score / posting store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("write cancelled")]
    Cancelled,

    #[error("write deadline exceeded")]
    TimedOut,

    /// Failure reported by a non-sled store implementation.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<sled::transaction::TransactionError<StoreError>> for StoreError {
    fn from(err: sled::transaction::TransactionError<StoreError>) -> Self {
        match err {
            sled::transaction::TransactionError::Abort(inner) => inner,
            sled::transaction::TransactionError::Storage(e) => StoreError::Sled(e),
        }
    }
}

/// Errors reading from the external paper source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed paper record in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("walking {path}: {source}")]
    Walk {
        path: String,
        #[source]
        source: walkdir::Error,
    },
}
