//! Error taxonomy for the answer pipeline.
//!
//! Infrastructure failures ([`ChatError::IndexNotReady`],
//! [`ChatError::EmbeddingUnavailable`]) are surfaced to the caller as
//! explicit errors. [`ChatError::NoRelevantContent`] is recovered one level
//! up: the orchestrator converts it into a fixed insufficient-information
//! answer instead of exposing an error. A failed turn never updates
//! conversation memory.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    /// `search` was called before any chunks were ingested.
    #[error("vector index is empty; run ingestion before querying")]
    IndexNotReady,

    /// The embedding gateway could not produce vectors. The turn fails and
    /// conversation state is left unchanged so the caller may retry.
    #[error("embedding gateway unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Retrieval found nothing above the score threshold, even after the
    /// relaxed retry.
    #[error("no passages scored above the relevance threshold")]
    NoRelevantContent,

    /// Ingestion was handed an empty or unreadable document. The index is
    /// left in its prior valid state.
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    /// Underlying SQLite failure.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Invalid configuration or parameter value.
    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ChatError>;
