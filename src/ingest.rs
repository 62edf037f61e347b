//! Document ingestion: chunk, embed in batches, rebuild the index.
//!
//! Ingestion replaces the whole index in one transaction, so a failure at
//! any stage (malformed document, gateway outage, storage error) leaves the
//! previous index generation intact and queryable.

use tracing::info;

use crate::chunk::chunk;
use crate::config::Config;
use crate::embedding::EmbeddingGateway;
use crate::errors::Result;
use crate::index::VectorIndex;
use crate::models::EmbeddedChunk;

#[derive(Debug)]
pub struct IngestStats {
    pub chunks: usize,
    pub dims: usize,
}

/// Ingest `document` into the index, replacing any previous contents.
pub async fn ingest_document(
    config: &Config,
    gateway: &dyn EmbeddingGateway,
    index: &dyn VectorIndex,
    document: &str,
) -> Result<IngestStats> {
    let chunks = chunk(
        document,
        config.chunking.max_chars,
        config.chunking.overlap_chars,
    )?;
    info!(chunks = chunks.len(), "chunked document");

    let mut embedded = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(config.embedding.batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = gateway.embed_batch(&texts).await?;
        embedded.extend(
            batch
                .iter()
                .cloned()
                .zip(vectors)
                .map(|(chunk, embedding)| EmbeddedChunk { chunk, embedding }),
        );
    }

    index.rebuild(&embedded).await?;
    let stats = IngestStats {
        chunks: embedded.len(),
        dims: gateway.dims(),
    };
    info!(
        chunks = stats.chunks,
        dims = stats.dims,
        model = gateway.model_name(),
        "index rebuilt"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{DisabledGateway, HashedGateway};
    use crate::errors::ChatError;
    use crate::index::MemoryIndex;

    #[tokio::test]
    async fn test_ingest_populates_index() {
        let config = Config::with_db("/tmp/unused.sqlite");
        let gateway = HashedGateway::new(256);
        let index = MemoryIndex::new();

        let doc = "The budget returned to surplus.\n\nNet debt remains within prudent limits.";
        let stats = ingest_document(&config, &gateway, &index, doc).await.unwrap();
        assert!(stats.chunks >= 1);
        assert_eq!(stats.dims, 256);
        assert_eq!(index.count().await.unwrap(), stats.chunks as u64);
    }

    #[tokio::test]
    async fn test_reingest_replaces_not_accumulates() {
        let config = Config::with_db("/tmp/unused.sqlite");
        let gateway = HashedGateway::new(256);
        let index = MemoryIndex::new();

        let doc = "The budget returned to surplus this financial period.";
        ingest_document(&config, &gateway, &index, doc).await.unwrap();
        let before = index.count().await.unwrap();
        ingest_document(&config, &gateway, &index, doc).await.unwrap();
        assert_eq!(index.count().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_empty_document_rejected_index_untouched() {
        let config = Config::with_db("/tmp/unused.sqlite");
        let gateway = HashedGateway::new(256);
        let index = MemoryIndex::new();
        ingest_document(&config, &gateway, &index, "prior valid content here")
            .await
            .unwrap();

        let err = ingest_document(&config, &gateway, &index, "  \n\n ")
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::MalformedDocument(_)));
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_gateway_failure_leaves_prior_generation() {
        let config = Config::with_db("/tmp/unused.sqlite");
        let hashed = HashedGateway::new(256);
        let index = MemoryIndex::new();
        ingest_document(&config, &hashed, &index, "prior valid content here")
            .await
            .unwrap();

        let err = ingest_document(&config, &DisabledGateway, &index, "new content")
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::EmbeddingUnavailable(_)));
        assert_eq!(index.count().await.unwrap(), 1);
    }
}
