//! Vector index abstraction and backends.
//!
//! The [`VectorIndex`] trait defines the storage operations the retrieval
//! pipeline needs: idempotent upsert, atomic rebuild, and persisted top-k
//! cosine similarity search. Two backends are provided:
//!
//! - [`SqliteIndex`] — the production backend. Embeddings are stored as
//!   little-endian f32 BLOBs; state survives process restart and a reload
//!   returns bit-identical ranking (ties broken by insertion order).
//! - [`MemoryIndex`] — in-memory backend for unit tests.
//!
//! Invariants: every stored embedding has identical dimensionality
//! (enforced against `index_meta.dims`); `search` before any ingestion
//! fails with [`ChatError::IndexNotReady`]; rebuild is a single transaction
//! so a failed ingestion leaves the prior generation intact.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::errors::{ChatError, Result};
use crate::models::{EmbeddedChunk, RetrievalResult};

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or update chunks. Idempotent on chunk id: re-upserting an
    /// identical chunk leaves the index unchanged.
    async fn upsert(&self, chunks: &[EmbeddedChunk]) -> Result<()>;

    /// Atomically replace the entire index contents with a new generation.
    async fn rebuild(&self, chunks: &[EmbeddedChunk]) -> Result<()>;

    /// Top-k passages by descending cosine similarity to `query_vec`.
    /// Ties are broken by original insertion order (stable).
    async fn search(&self, query_vec: &[f32], k: usize) -> Result<Vec<RetrievalResult>>;

    /// Number of indexed chunks.
    async fn count(&self) -> Result<u64>;
}

/// Rank scored candidates: descending score, insertion position ascending.
fn rank(mut scored: Vec<(RetrievalResult, i64)>, k: usize) -> Vec<RetrievalResult> {
    scored.sort_by(|a, b| {
        b.0.score
            .partial_cmp(&a.0.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.1.cmp(&b.1))
    });
    scored.truncate(k);
    scored.into_iter().map(|(r, _)| r).collect()
}

// ============ SQLite backend ============

/// SQLite-backed [`VectorIndex`] over the `chunks` / `chunk_vectors` /
/// `index_meta` tables.
pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Check the batch against the recorded dimensionality, recording it on
    /// first use. All stored embeddings must share one dimensionality.
    async fn check_dims(conn: &mut sqlx::SqliteConnection, chunks: &[EmbeddedChunk]) -> Result<()> {
        let Some(first) = chunks.first() else {
            return Ok(());
        };
        let dims = first.embedding.len();
        if dims == 0 || chunks.iter().any(|c| c.embedding.len() != dims) {
            return Err(ChatError::Config(
                "all embeddings in a batch must share one non-zero dimensionality".to_string(),
            ));
        }

        let stored: Option<String> =
            sqlx::query_scalar("SELECT value FROM index_meta WHERE key = 'dims'")
                .fetch_optional(&mut *conn)
                .await?;

        match stored {
            Some(s) if s != dims.to_string() => Err(ChatError::Config(format!(
                "embedding dimensionality {dims} does not match index ({s}); rebuild the index"
            ))),
            Some(_) => Ok(()),
            None => {
                sqlx::query(
                    "INSERT INTO index_meta (key, value) VALUES ('dims', ?)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                )
                .bind(dims.to_string())
                .execute(conn)
                .await?;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn upsert(&self, chunks: &[EmbeddedChunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::check_dims(&mut *tx, chunks).await?;

        let mut next_position: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(position) + 1, 0) FROM chunks")
                .fetch_one(&mut *tx)
                .await?;

        for ec in chunks {
            let existing: Option<i64> =
                sqlx::query_scalar("SELECT position FROM chunks WHERE id = ?")
                    .bind(&ec.chunk.id)
                    .fetch_optional(&mut *tx)
                    .await?;
            // Updates keep their original position so ranking ties stay stable.
            let position = existing.unwrap_or_else(|| {
                let p = next_position;
                next_position += 1;
                p
            });

            sqlx::query(
                r#"
                INSERT INTO chunks (id, position, text, start_offset, end_offset)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    text = excluded.text,
                    start_offset = excluded.start_offset,
                    end_offset = excluded.end_offset
                "#,
            )
            .bind(&ec.chunk.id)
            .bind(position)
            .bind(&ec.chunk.text)
            .bind(ec.chunk.start_offset as i64)
            .bind(ec.chunk.end_offset as i64)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO chunk_vectors (chunk_id, embedding) VALUES (?, ?)
                ON CONFLICT(chunk_id) DO UPDATE SET embedding = excluded.embedding
                "#,
            )
            .bind(&ec.chunk.id)
            .bind(vec_to_blob(&ec.embedding))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(chunks = chunks.len(), "upserted chunk batch");
        Ok(())
    }

    async fn rebuild(&self, chunks: &[EmbeddedChunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunk_vectors")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chunks").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM index_meta WHERE key = 'dims'")
            .execute(&mut *tx)
            .await?;

        Self::check_dims(&mut *tx, chunks).await?;

        for (position, ec) in chunks.iter().enumerate() {
            sqlx::query(
                "INSERT INTO chunks (id, position, text, start_offset, end_offset) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&ec.chunk.id)
            .bind(position as i64)
            .bind(&ec.chunk.text)
            .bind(ec.chunk.start_offset as i64)
            .bind(ec.chunk.end_offset as i64)
            .execute(&mut *tx)
            .await?;

            sqlx::query("INSERT INTO chunk_vectors (chunk_id, embedding) VALUES (?, ?)")
                .bind(&ec.chunk.id)
                .bind(vec_to_blob(&ec.embedding))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!(chunks = chunks.len(), "rebuilt index generation");
        Ok(())
    }

    async fn search(&self, query_vec: &[f32], k: usize) -> Result<Vec<RetrievalResult>> {
        let rows = sqlx::query(
            r#"
            SELECT cv.chunk_id, cv.embedding, c.text, c.position
            FROM chunk_vectors cv
            JOIN chunks c ON c.id = cv.chunk_id
            ORDER BY c.position ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Err(ChatError::IndexNotReady);
        }

        let scored: Vec<(RetrievalResult, i64)> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vec = blob_to_vec(&blob);
                let result = RetrievalResult {
                    chunk_id: row.get("chunk_id"),
                    score: cosine_similarity(query_vec, &vec),
                    text: row.get("text"),
                };
                (result, row.get::<i64, _>("position"))
            })
            .collect();

        Ok(rank(scored, k))
    }

    async fn count(&self) -> Result<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(n as u64)
    }
}

// ============ In-memory backend ============

struct MemoryEntry {
    chunk_id: String,
    text: String,
    embedding: Vec<f32>,
    position: i64,
}

/// In-memory [`VectorIndex`] with the same semantics as [`SqliteIndex`],
/// minus persistence. Used in unit tests.
#[derive(Default)]
pub struct MemoryIndex {
    entries: RwLock<Vec<MemoryEntry>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert(&self, chunks: &[EmbeddedChunk]) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        let by_id: HashMap<String, usize> = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.chunk_id.clone(), i))
            .collect();
        let mut next_position = entries.iter().map(|e| e.position + 1).max().unwrap_or(0);

        for ec in chunks {
            match by_id.get(&ec.chunk.id) {
                Some(&i) => {
                    entries[i].text = ec.chunk.text.clone();
                    entries[i].embedding = ec.embedding.clone();
                }
                None => {
                    entries.push(MemoryEntry {
                        chunk_id: ec.chunk.id.clone(),
                        text: ec.chunk.text.clone(),
                        embedding: ec.embedding.clone(),
                        position: next_position,
                    });
                    next_position += 1;
                }
            }
        }
        Ok(())
    }

    async fn rebuild(&self, chunks: &[EmbeddedChunk]) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        entries.clear();
        for (position, ec) in chunks.iter().enumerate() {
            entries.push(MemoryEntry {
                chunk_id: ec.chunk.id.clone(),
                text: ec.chunk.text.clone(),
                embedding: ec.embedding.clone(),
                position: position as i64,
            });
        }
        Ok(())
    }

    async fn search(&self, query_vec: &[f32], k: usize) -> Result<Vec<RetrievalResult>> {
        let entries = self.entries.read().unwrap();
        if entries.is_empty() {
            return Err(ChatError::IndexNotReady);
        }
        let scored: Vec<(RetrievalResult, i64)> = entries
            .iter()
            .map(|e| {
                (
                    RetrievalResult {
                        chunk_id: e.chunk_id.clone(),
                        score: cosine_similarity(query_vec, &e.embedding),
                        text: e.text.clone(),
                    },
                    e.position,
                )
            })
            .collect();
        Ok(rank(scored, k))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.entries.read().unwrap().len() as u64)
    }
}
