//! Query enhancement against conversation state.
//!
//! Follow-ups like "tell me more" carry no retrievable signal on their own.
//! When such a query arrives and the session has an established topic, the
//! enhancer appends a clarifying phrase built from that topic and the
//! previous turn's query. Non-ambiguous queries pass through unchanged, as
//! does an ambiguous first turn (nothing to enhance with).
//!
//! The enhanced query always contains the original query verbatim, so its
//! token count can never drop below the input's.

use tracing::debug;

use crate::embedding::tokenize;
use crate::memory::ConversationMemory;
use crate::topic::TopicLexicon;

/// Queries with fewer tokens than this are treated as ambiguous.
pub const MIN_TOKENS: usize = 4;

/// Pronouns and deictic terms that point outside the query itself.
const DEICTIC_TERMS: &[&str] = &[
    "it", "that", "this", "they", "them", "those", "these", "more", "else", "again", "same",
];

/// Stock follow-up phrases that are always ambiguous, regardless of length.
const VAGUE_PHRASES: &[&str] = &[
    "tell me more",
    "what about it",
    "explain more",
    "more details",
    "go on",
];

/// A query is ambiguous when it is a stock follow-up phrase, too short,
/// predominantly deictic, or shares no vocabulary with any known topic.
pub fn is_ambiguous(query: &str, lexicon: &TopicLexicon) -> bool {
    let trimmed = query.trim().to_lowercase();
    if VAGUE_PHRASES.iter().any(|p| trimmed.contains(p)) {
        return true;
    }

    let tokens = tokenize(query);
    if tokens.len() < MIN_TOKENS {
        return true;
    }

    let deictic = tokens
        .iter()
        .filter(|t| DEICTIC_TERMS.contains(&t.as_str()))
        .count();
    if deictic * 2 > tokens.len() {
        return true;
    }

    !lexicon.overlaps_vocabulary(query)
}

/// Rewrite `query` into an effective query for retrieval.
pub fn enhance(query: &str, memory: &ConversationMemory, lexicon: &TopicLexicon) -> String {
    if !is_ambiguous(query, lexicon) {
        return query.to_string();
    }
    let Some(topic) = memory.current_topic() else {
        return query.to_string();
    };

    let effective = match memory.last_turn() {
        Some(last) if !last.query.trim().is_empty() => {
            format!("{query} about {topic} ({})", last.query.trim())
        }
        _ => format!("{query} about {topic}"),
    };
    debug!(%topic, original = %query, enhanced = %effective, "enhanced ambiguous query");
    effective
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConversationTurn;
    use crate::topic::Topic;

    fn memory_with(query: &str, topic: Topic) -> ConversationMemory {
        let mut memory = ConversationMemory::new(10);
        memory.record(ConversationTurn {
            query: query.to_string(),
            enhanced_query: query.to_string(),
            topic,
            answer_summary: String::new(),
            seq: 0,
        });
        memory
    }

    #[test]
    fn test_vague_phrase_is_ambiguous() {
        let lex = TopicLexicon::default();
        assert!(is_ambiguous("tell me more", &lex));
        assert!(is_ambiguous("what about it", &lex));
        assert!(is_ambiguous("could you give me more details please", &lex));
    }

    #[test]
    fn test_short_query_is_ambiguous() {
        let lex = TopicLexicon::default();
        assert!(is_ambiguous("the budget", &lex));
    }

    #[test]
    fn test_deictic_majority_is_ambiguous() {
        let lex = TopicLexicon::default();
        // Contains a topic word, so only the deictic rule can fire.
        assert!(is_ambiguous("it that this more budget", &lex));
    }

    #[test]
    fn test_no_topic_vocabulary_is_ambiguous() {
        let lex = TopicLexicon::default();
        assert!(is_ambiguous("please describe the overall picture here", &lex));
    }

    #[test]
    fn test_substantive_query_is_not_ambiguous() {
        let lex = TopicLexicon::default();
        assert!(!is_ambiguous("what is the net debt position currently", &lex));
    }

    #[test]
    fn test_enhance_appends_topic_and_last_subject() {
        let lex = TopicLexicon::default();
        let memory = memory_with("What is the budget situation?", Topic::Budget);
        let effective = enhance("tell me more", &memory, &lex);
        assert!(effective.contains("tell me more"));
        assert!(effective.contains("budget"));
        assert!(effective.contains("What is the budget situation?"));
        assert!(tokenize(&effective).len() >= tokenize("tell me more").len());
    }

    #[test]
    fn test_enhance_first_turn_passes_through() {
        let lex = TopicLexicon::default();
        let memory = ConversationMemory::new(10);
        assert_eq!(enhance("tell me more", &memory, &lex), "tell me more");
    }

    #[test]
    fn test_enhance_no_current_topic_passes_through() {
        let lex = TopicLexicon::default();
        let memory = memory_with("hello there", Topic::General);
        assert_eq!(enhance("what about it", &memory, &lex), "what about it");
    }

    #[test]
    fn test_enhance_clear_query_passes_through() {
        let lex = TopicLexicon::default();
        let memory = memory_with("What is the budget situation?", Topic::Budget);
        let query = "how large are the infrastructure capital works projects";
        assert_eq!(enhance(query, &memory, &lex), query);
    }
}
