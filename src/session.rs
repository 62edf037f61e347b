//! Per-turn orchestration and the session registry.
//!
//! [`Engine`] is the conversation boundary exposed to callers. Each turn
//! runs the phases Enhancing, Retrieving, and Composing to completion
//! before the next turn in the same session begins; sessions are isolated
//! from each other and may run concurrently.
//!
//! Error handling per turn:
//! - `NoRelevantContent` is recovered into the fixed
//!   insufficient-information answer; the turn still completes and is
//!   recorded.
//! - `EmbeddingUnavailable`, `IndexNotReady`, and storage errors fail the
//!   turn. Conversation memory is updated only after a turn completes, so a
//!   failed turn leaves no trace and the caller may simply resubmit.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::compose::{compose, insufficient};
use crate::config::Config;
use crate::embedding::EmbeddingGateway;
use crate::enhance::enhance;
use crate::errors::{ChatError, Result};
use crate::index::VectorIndex;
use crate::memory::ConversationMemory;
use crate::models::{Answer, ConversationTurn};
use crate::retrieve::{retrieve, RetrievalParams};
use crate::topic::{Topic, TopicLexicon};

pub struct Engine {
    gateway: Arc<dyn EmbeddingGateway>,
    index: Arc<dyn VectorIndex>,
    lexicon: TopicLexicon,
    retrieval: RetrievalParams,
    window: usize,
    sessions: Mutex<HashMap<String, Arc<Mutex<ConversationMemory>>>>,
}

impl Engine {
    pub fn new(
        config: &Config,
        gateway: Arc<dyn EmbeddingGateway>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            gateway,
            index,
            lexicon: TopicLexicon::new(&config.topics),
            retrieval: RetrievalParams::from(&config.retrieval),
            window: config.memory.window,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Memory for `session_id`, created fresh on first use.
    async fn session(&self, session_id: &str) -> Arc<Mutex<ConversationMemory>> {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(ConversationMemory::new(self.window))))
            .clone()
    }

    /// Run one conversation turn and return the composed answer.
    pub async fn submit_query(&self, session_id: &str, text: &str) -> Result<Answer> {
        if text.trim().is_empty() {
            return Ok(insufficient(Topic::General));
        }

        let session = self.session(session_id).await;
        // Held for the whole turn: one session is single-writer and turns
        // never interleave within it.
        let mut memory = session.lock().await;

        debug!(session_id, query = text, "turn: enhancing");
        let effective = enhance(text, &memory, &self.lexicon);
        let topic = self.lexicon.resolve(&effective, memory.current_topic());

        debug!(session_id, %topic, effective, "turn: retrieving");
        let answer = match retrieve(
            self.gateway.as_ref(),
            self.index.as_ref(),
            &effective,
            &self.retrieval,
        )
        .await
        {
            Ok(results) => {
                debug!(session_id, hits = results.len(), "turn: composing");
                compose(&results, topic)
            }
            Err(ChatError::NoRelevantContent) => {
                debug!(session_id, "turn: composing insufficient-information answer");
                compose(&[], topic)
            }
            Err(other) => return Err(other),
        };

        let seq = memory.next_seq();
        memory.record(ConversationTurn {
            query: text.to_string(),
            enhanced_query: effective,
            topic,
            answer_summary: answer.summary.clone(),
            seq,
        });
        info!(session_id, %topic, seq, "turn completed");
        Ok(answer)
    }

    /// Clear one session's history. A no-op for unknown ids.
    pub async fn reset_session(&self, session_id: &str) {
        let sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get(session_id) {
            session.lock().await.reset();
            info!(session_id, "session reset");
        }
    }

    /// One-line description of a session's state, for the REPL.
    pub async fn session_summary(&self, session_id: &str) -> String {
        let sessions = self.sessions.lock().await;
        let Some(session) = sessions.get(session_id) else {
            return "No conversation yet.".to_string();
        };
        let memory = session.lock().await;
        if memory.is_empty() {
            return "No conversation yet.".to_string();
        }
        let topic = memory
            .current_topic()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "none".to_string());
        format!(
            "{} turn(s) in this conversation; current topic: {topic}",
            memory.len()
        )
    }

    pub fn lexicon(&self) -> &TopicLexicon {
        &self.lexicon
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashedGateway;
    use crate::index::MemoryIndex;
    use crate::models::{Chunk, EmbeddedChunk};

    async fn engine_with(texts: &[&str]) -> Engine {
        let gateway = Arc::new(HashedGateway::new(1024));
        let index = Arc::new(MemoryIndex::new());
        let embeddings = gateway
            .embed_batch(&texts.iter().map(|t| t.to_string()).collect::<Vec<_>>())
            .await
            .unwrap();
        let chunks: Vec<EmbeddedChunk> = texts
            .iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (text, embedding))| EmbeddedChunk {
                chunk: Chunk {
                    id: format!("chunk-{i}"),
                    text: text.to_string(),
                    start_offset: 0,
                    end_offset: text.len(),
                },
                embedding,
            })
            .collect();
        index.rebuild(&chunks).await.unwrap();

        let mut config = Config::with_db("/tmp/unused.sqlite");
        config.retrieval.min_score = 0.10;
        config.retrieval.relax_margin = 0.05;
        Engine::new(&config, gateway, index)
    }

    #[tokio::test]
    async fn test_empty_query_is_insufficient_and_unrecorded() {
        let engine = engine_with(&["the budget returned to surplus"]).await;
        let answer = engine.submit_query("s1", "   ").await.unwrap();
        assert!(answer.citations.is_empty());
        assert_eq!(engine.session_summary("s1").await, "No conversation yet.");
    }

    #[tokio::test]
    async fn test_turn_records_memory_and_topic() {
        let engine = engine_with(&[
            "the operating budget returned to surplus with revenue growth",
        ])
        .await;
        let answer = engine
            .submit_query("s1", "what is the budget surplus revenue position")
            .await
            .unwrap();
        assert_eq!(answer.topic, Topic::Budget);
        assert!(!answer.citations.is_empty());
        let summary = engine.session_summary("s1").await;
        assert!(summary.contains("1 turn"));
        assert!(summary.contains("budget"));
    }

    #[tokio::test]
    async fn test_no_relevant_content_recovered_and_recorded() {
        let engine = engine_with(&["the operating budget returned to surplus"]).await;
        let answer = engine
            .submit_query("s1", "quantum entanglement hardware specifications please")
            .await
            .unwrap();
        assert!(answer.summary.contains("does not contain enough information"));
        assert!(answer.citations.is_empty());
        assert!(engine.session_summary("s1").await.contains("1 turn"));
    }

    #[tokio::test]
    async fn test_index_not_ready_leaves_no_trace() {
        let gateway = Arc::new(HashedGateway::new(128));
        let index = Arc::new(MemoryIndex::new());
        let config = Config::with_db("/tmp/unused.sqlite");
        let engine = Engine::new(&config, gateway, index);

        let err = engine
            .submit_query("s1", "what is the budget position today")
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::IndexNotReady));
        assert_eq!(engine.session_summary("s1").await, "No conversation yet.");
    }

    #[tokio::test]
    async fn test_reset_session_clears_state() {
        let engine = engine_with(&[
            "the operating budget returned to surplus with revenue growth",
        ])
        .await;
        engine
            .submit_query("s1", "what is the budget surplus revenue position")
            .await
            .unwrap();
        engine.reset_session("s1").await;
        assert_eq!(engine.session_summary("s1").await, "No conversation yet.");
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let engine = engine_with(&[
            "the operating budget returned to surplus with revenue growth",
        ])
        .await;
        engine
            .submit_query("a", "what is the budget surplus revenue position")
            .await
            .unwrap();
        assert!(engine.session_summary("a").await.contains("1 turn"));
        assert_eq!(engine.session_summary("b").await, "No conversation yet.");
    }
}
