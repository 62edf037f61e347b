//! Embedding gateway abstraction and providers.
//!
//! The [`EmbeddingGateway`] trait is the only suspension point in the
//! pipeline: everything else is in-memory and non-blocking. Vector
//! dimensionality is fixed for the lifetime of one index; re-embedding with
//! a different dimensionality requires a full index rebuild.
//!
//! Providers:
//! - **[`OpenAiGateway`]** — calls the OpenAI embeddings API with batching,
//!   retry, and exponential backoff.
//! - **[`HashedGateway`]** — deterministic offline token-hash projection;
//!   used by tests and air-gapped runs.
//! - **[`DisabledGateway`]** — always fails; used when embeddings are not
//!   configured.
//!
//! Gateway failures surface as [`ChatError::EmbeddingUnavailable`] and fail
//! the turn without touching conversation state.

use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::config::EmbeddingConfig;
use crate::errors::{ChatError, Result};

/// External embedding capability consumed by ingestion and retrieval.
#[async_trait]
pub trait EmbeddingGateway: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Embedding vector dimensionality.
    fn dims(&self) -> usize;

    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vecs = self.embed_batch(&[text.to_string()]).await?;
        if vecs.is_empty() {
            return Err(ChatError::EmbeddingUnavailable(
                "empty embedding response".to_string(),
            ));
        }
        Ok(vecs.swap_remove(0))
    }
}

/// Instantiate the gateway selected by configuration.
pub fn create_gateway(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingGateway>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiGateway::new(config)?)),
        "hashed" => Ok(Box::new(HashedGateway::new(config.dims))),
        "disabled" => Ok(Box::new(DisabledGateway)),
        other => Err(ChatError::Config(format!(
            "unknown embedding provider: {other}"
        ))),
    }
}

// ============ Disabled Gateway ============

/// A gateway that always fails; configured via `provider = "disabled"`.
pub struct DisabledGateway;

#[async_trait]
impl EmbeddingGateway for DisabledGateway {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(ChatError::EmbeddingUnavailable(
            "embedding provider is disabled".to_string(),
        ))
    }
}

// ============ Hashed Gateway ============

/// Deterministic bag-of-tokens embedding via feature hashing.
///
/// Each lowercased alphanumeric token is hashed into one of `dims` buckets
/// and the resulting count vector is L2-normalized, so identical texts get
/// identical vectors and token overlap translates into cosine similarity.
/// No model, no network, fully reproducible.
pub struct HashedGateway {
    dims: usize,
}

impl HashedGateway {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dims];
        for token in tokenize(text) {
            let mut hasher = Sha256::new();
            hasher.update(token.as_bytes());
            let digest = hasher.finalize();
            let bucket = u64::from_le_bytes(digest[..8].try_into().unwrap()) as usize % self.dims;
            vec[bucket] += 1.0;
        }
        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in &mut vec {
                *x /= norm;
            }
        }
        vec
    }
}

#[async_trait]
impl EmbeddingGateway for HashedGateway {
    fn model_name(&self) -> &str {
        "hashed-bow"
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Lowercased alphanumeric tokens of `text`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

// ============ OpenAI Gateway ============

/// Embedding gateway backed by the OpenAI embeddings API.
///
/// Requires `OPENAI_API_KEY` in the environment. Transient failures
/// (HTTP 429 and 5xx, network errors) are retried with exponential backoff
/// (1s, 2s, 4s, ... capped at 32s); other client errors fail immediately.
pub struct OpenAiGateway {
    model: String,
    dims: usize,
    max_retries: u32,
    timeout_secs: u64,
}

impl OpenAiGateway {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config.model.clone().ok_or_else(|| {
            ChatError::Config("embedding.model required for the openai provider".to_string())
        })?;
        if std::env::var("OPENAI_API_KEY").is_err() {
            return Err(ChatError::Config(
                "OPENAI_API_KEY environment variable not set".to_string(),
            ));
        }
        Ok(Self {
            model,
            dims: config.dims,
            max_retries: config.max_retries,
            timeout_secs: config.timeout_secs,
        })
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ChatError::EmbeddingUnavailable("OPENAI_API_KEY not set".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| ChatError::EmbeddingUnavailable(e.to_string()))?;

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post("https://api.openai.com/v1/embeddings")
                .header("Authorization", format!("Bearer {api_key}"))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| ChatError::EmbeddingUnavailable(e.to_string()))?;
                        return parse_response(&json);
                    }
                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(format!("OpenAI API error {status}: {body_text}"));
                        continue;
                    }
                    return Err(ChatError::EmbeddingUnavailable(format!(
                        "OpenAI API error {status}: {body_text}"
                    )));
                }
                Err(e) => {
                    last_err = Some(e.to_string());
                    continue;
                }
            }
        }

        Err(ChatError::EmbeddingUnavailable(
            last_err.unwrap_or_else(|| "embedding failed after retries".to_string()),
        ))
    }
}

#[async_trait]
impl EmbeddingGateway for OpenAiGateway {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.request(texts).await
    }
}

/// Extract `data[].embedding` arrays from an OpenAI response, in order.
fn parse_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| {
            ChatError::EmbeddingUnavailable("invalid response: missing data array".to_string())
        })?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| {
                ChatError::EmbeddingUnavailable("invalid response: missing embedding".to_string())
            })?;
        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        embeddings.push(vec);
    }
    Ok(embeddings)
}

// ============ Vector helpers ============

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector. Reverses [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`; `0.0` for empty vectors or vectors of
/// different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        assert_eq!(blob.len(), 20);
        assert_eq!(blob_to_vec(&blob), vec);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[tokio::test]
    async fn test_hashed_gateway_deterministic() {
        let gw = HashedGateway::new(128);
        let a = gw.embed("the budget deficit").await.unwrap();
        let b = gw.embed("the budget deficit").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 128);
    }

    #[tokio::test]
    async fn test_hashed_gateway_identical_text_full_similarity() {
        let gw = HashedGateway::new(128);
        let a = gw.embed("strategic deficit of $91.5m").await.unwrap();
        let b = gw.embed("strategic deficit of $91.5m").await.unwrap();
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_hashed_gateway_disjoint_tokens_zero_similarity() {
        let gw = HashedGateway::new(4096);
        let a = gw.embed("budget surplus revenue").await.unwrap();
        let b = gw.embed("kangaroo telescope").await.unwrap();
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_hashed_gateway_overlap_ranks_higher() {
        let gw = HashedGateway::new(4096);
        let query = gw.embed("what is the budget position").await.unwrap();
        let related = gw.embed("the budget position is a deficit").await.unwrap();
        let unrelated = gw.embed("pine forests cover the hills").await.unwrap();
        assert!(
            cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated)
        );
    }

    #[tokio::test]
    async fn test_disabled_gateway_fails() {
        let gw = DisabledGateway;
        let err = gw.embed("anything").await.unwrap_err();
        assert!(matches!(err, ChatError::EmbeddingUnavailable(_)));
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("What is the Budget-situation, really?"),
            vec!["what", "is", "the", "budget", "situation", "really"]
        );
        assert!(tokenize("  ...  ").is_empty());
    }
}
