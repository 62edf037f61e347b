//! Core data types flowing through the ingestion and answer pipeline.

use serde::Serialize;

use crate::topic::Topic;

/// A contiguous span of the source document, produced by the chunker.
///
/// `text` is always the exact byte slice `document[start_offset..end_offset]`
/// of the original document, so concatenating chunk texts (minus their
/// overlapped prefixes) reconstructs the document exactly. Chunks are
/// immutable once created and owned by the vector index after ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Deterministic id derived from the chunk's position (`chunk-<n>`).
    pub id: String,
    pub text: String,
    /// Byte offset of the span start in the original document.
    pub start_offset: usize,
    /// Byte offset one past the span end.
    pub end_offset: usize,
}

/// A chunk paired with its embedding vector, ready for indexing.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// A scored passage returned from the vector index. Ephemeral, produced per
/// query, never persisted.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub chunk_id: String,
    /// Cosine similarity against the query embedding, in `[-1.0, 1.0]`.
    pub score: f32,
    pub text: String,
}

/// One completed query/answer exchange recorded in conversation memory.
/// Never mutated after creation; failed turns are never recorded.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub query: String,
    pub enhanced_query: String,
    pub topic: Topic,
    pub answer_summary: String,
    /// Monotonic per-session counter.
    pub seq: u64,
}

/// A labelled block of answer lines.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerSection {
    pub label: String,
    pub lines: Vec<String>,
}

/// Structured answer composed from retrieved passages by template filling.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub topic: Topic,
    pub summary: String,
    pub sections: Vec<AnswerSection>,
    /// Chunk ids of the passages the answer was drawn from, best first.
    pub citations: Vec<String>,
}
