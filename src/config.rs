use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Per-topic keyword overrides, keyed by topic name
    /// (e.g. `[topics] budget = ["budget", "appropriation"]`).
    #[serde(default)]
    pub topics: HashMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    1000
}
fn default_overlap_chars() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Minimum similarity score a passage must reach to be used.
    #[serde(default = "default_min_score")]
    pub min_score: f32,
    /// Subtracted from `min_score` for the single relaxed retry.
    #[serde(default = "default_relax_margin")]
    pub relax_margin: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_score: default_min_score(),
            relax_margin: default_relax_margin(),
        }
    }
}

fn default_top_k() -> usize {
    3
}
fn default_min_score() -> f32 {
    0.25
}
fn default_relax_margin() -> f32 {
    0.15
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"openai"`, `"hashed"`, or `"disabled"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: default_dims(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "hashed".to_string()
}
fn default_dims() -> usize {
    256
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct MemoryConfig {
    /// Number of conversation turns retained per session.
    #[serde(default = "default_window")]
    pub window: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
        }
    }
}

fn default_window() -> usize {
    10
}

impl Config {
    /// Config rooted at a database path, defaults everywhere else.
    /// Used by tests and one-shot invocations.
    pub fn with_db(path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig { path: path.into() },
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            memory: MemoryConfig::default(),
            topics: HashMap::new(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.max_chars {
        anyhow::bail!("chunking.overlap_chars must be < chunking.max_chars");
    }

    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if !(0.0..=1.0).contains(&config.retrieval.min_score) {
        anyhow::bail!("retrieval.min_score must be in [0.0, 1.0]");
    }
    if config.retrieval.relax_margin < 0.0 {
        anyhow::bail!("retrieval.relax_margin must be >= 0.0");
    }

    if config.memory.window < 1 {
        anyhow::bail!("memory.window must be >= 1");
    }

    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    match config.embedding.provider.as_str() {
        "hashed" | "disabled" => {}
        "openai" => {
            if config.embedding.model.is_none() {
                anyhow::bail!("embedding.model must be specified for the openai provider");
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be openai, hashed, or disabled.",
            other
        ),
    }

    for name in config.topics.keys() {
        if crate::topic::Topic::from_name(name).is_none() {
            anyhow::bail!("Unknown topic in [topics] overrides: '{}'", name);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::with_db("/tmp/chat.sqlite");
        assert!(validate(&config).is_ok());
        assert_eq!(config.chunking.max_chars, 1000);
        assert_eq!(config.chunking.overlap_chars, 200);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.memory.window, 10);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_max() {
        let mut config = Config::with_db("/tmp/chat.sqlite");
        config.chunking.overlap_chars = config.chunking.max_chars;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let mut config = Config::with_db("/tmp/chat.sqlite");
        config.embedding.provider = "onnx".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_unknown_topic_override_rejected() {
        let mut config = Config::with_db("/tmp/chat.sqlite");
        config
            .topics
            .insert("weather".to_string(), vec!["rain".to_string()]);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config: Config = toml::from_str(
            r#"
            [db]
            path = "data/chat.sqlite"

            [retrieval]
            min_score = 0.15
            "#,
        )
        .unwrap();
        assert!(validate(&config).is_ok());
        assert!((config.retrieval.min_score - 0.15).abs() < f32::EPSILON);
        assert_eq!(config.embedding.provider, "hashed");
    }
}
