//! Retrieval over the vector index with relevance filtering.
//!
//! Embeds the effective query, asks the index for the top-k passages, and
//! drops anything below `min_score`. If nothing survives, one relaxed retry
//! filters the same candidate set at `min_score - relax_margin` before
//! giving up with [`ChatError::NoRelevantContent`]. The index is searched
//! once per turn; the retry re-filters, it does not re-query.

use tracing::debug;

use crate::config::RetrievalConfig;
use crate::embedding::EmbeddingGateway;
use crate::errors::{ChatError, Result};
use crate::index::VectorIndex;
use crate::models::RetrievalResult;

/// Thresholds controlling how many passages come back and how relevant they
/// must be. Built from [`RetrievalConfig`]; defaults: k 3, min_score 0.25,
/// relax_margin 0.15.
#[derive(Debug, Clone)]
pub struct RetrievalParams {
    pub top_k: usize,
    pub min_score: f32,
    pub relax_margin: f32,
}

impl From<&RetrievalConfig> for RetrievalParams {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            top_k: config.top_k,
            min_score: config.min_score,
            relax_margin: config.relax_margin,
        }
    }
}

/// Fetch the passages most relevant to `query`, best first.
///
/// # Errors
///
/// - [`ChatError::IndexNotReady`] when the index holds no chunks.
/// - [`ChatError::EmbeddingUnavailable`] when the gateway fails.
/// - [`ChatError::NoRelevantContent`] when nothing scores above the relaxed
///   threshold.
pub async fn retrieve(
    gateway: &dyn EmbeddingGateway,
    index: &dyn VectorIndex,
    query: &str,
    params: &RetrievalParams,
) -> Result<Vec<RetrievalResult>> {
    let query_vec = gateway.embed(query).await?;
    let candidates = index.search(&query_vec, params.top_k).await?;

    let kept: Vec<RetrievalResult> = candidates
        .iter()
        .filter(|r| r.score >= params.min_score)
        .cloned()
        .collect();
    if !kept.is_empty() {
        debug!(
            hits = kept.len(),
            top_score = kept[0].score,
            "retrieval satisfied at primary threshold"
        );
        return Ok(kept);
    }

    let relaxed_threshold = params.min_score - params.relax_margin;
    let relaxed: Vec<RetrievalResult> = candidates
        .into_iter()
        .filter(|r| r.score >= relaxed_threshold)
        .collect();
    if !relaxed.is_empty() {
        debug!(
            hits = relaxed.len(),
            threshold = relaxed_threshold,
            "retrieval satisfied at relaxed threshold"
        );
        return Ok(relaxed);
    }

    Err(ChatError::NoRelevantContent)
}
