//! Bounded per-session conversation memory.
//!
//! Holds the most recent completed turns in a sliding window. The session's
//! current topic is not stored separately; it is derived on demand as the
//! topic of the most recent turn whose topic is not [`Topic::General`].
//! When general-topic turns push every substantive turn out of the window,
//! the current topic naturally becomes `None`.

use std::collections::VecDeque;

use crate::models::ConversationTurn;
use crate::topic::Topic;

/// Default sliding window size.
pub const DEFAULT_WINDOW: usize = 10;

#[derive(Debug)]
pub struct ConversationMemory {
    turns: VecDeque<ConversationTurn>,
    window: usize,
    next_seq: u64,
}

impl ConversationMemory {
    /// `window` is clamped to at least 1.
    pub fn new(window: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            window: window.max(1),
            next_seq: 0,
        }
    }

    /// Next sequence number for a turn about to be recorded. Monotonic for
    /// the lifetime of the session, unaffected by window eviction.
    pub fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Append a completed turn, evicting the oldest once past the window.
    pub fn record(&mut self, turn: ConversationTurn) {
        if self.turns.len() == self.window {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    /// Topic of the most recent non-general turn still inside the window.
    pub fn current_topic(&self) -> Option<Topic> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.topic != Topic::General)
            .map(|t| t.topic)
    }

    /// The most recently recorded turn, if any.
    pub fn last_turn(&self) -> Option<&ConversationTurn> {
        self.turns.back()
    }

    /// Up to `n` most recent turns, oldest first.
    pub fn recent_context(&self, n: usize) -> Vec<&ConversationTurn> {
        let skip = self.turns.len().saturating_sub(n);
        self.turns.iter().skip(skip).collect()
    }

    /// Drop all turns. Sequence numbering restarts as well.
    pub fn reset(&mut self) {
        self.turns.clear();
        self.next_seq = 0;
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(seq: u64, query: &str, topic: Topic) -> ConversationTurn {
        ConversationTurn {
            query: query.to_string(),
            enhanced_query: query.to_string(),
            topic,
            answer_summary: format!("summary {seq}"),
            seq,
        }
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut memory = ConversationMemory::new(3);
        for i in 0..5 {
            let seq = memory.next_seq();
            memory.record(turn(seq, &format!("query {i}"), Topic::Budget));
        }
        assert_eq!(memory.len(), 3);
        assert_eq!(memory.recent_context(10)[0].query, "query 2");
        assert_eq!(memory.last_turn().unwrap().query, "query 4");
    }

    #[test]
    fn test_seq_is_monotonic_across_eviction() {
        let mut memory = ConversationMemory::new(2);
        for i in 0..4 {
            let seq = memory.next_seq();
            assert_eq!(seq, i);
            memory.record(turn(seq, "q", Topic::General));
        }
        assert_eq!(memory.next_seq(), 4);
    }

    #[test]
    fn test_current_topic_skips_general() {
        let mut memory = ConversationMemory::new(10);
        memory.record(turn(0, "budget question", Topic::Budget));
        memory.record(turn(1, "hello", Topic::General));
        assert_eq!(memory.current_topic(), Some(Topic::Budget));
    }

    #[test]
    fn test_current_topic_none_when_all_general() {
        let mut memory = ConversationMemory::new(10);
        assert_eq!(memory.current_topic(), None);
        memory.record(turn(0, "hi", Topic::General));
        memory.record(turn(1, "thanks", Topic::General));
        assert_eq!(memory.current_topic(), None);
    }

    #[test]
    fn test_current_topic_expires_with_window() {
        let mut memory = ConversationMemory::new(2);
        memory.record(turn(0, "debt question", Topic::Debt));
        memory.record(turn(1, "hello", Topic::General));
        assert_eq!(memory.current_topic(), Some(Topic::Debt));
        // The debt turn falls out of the window.
        memory.record(turn(2, "hello again", Topic::General));
        assert_eq!(memory.current_topic(), None);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut memory = ConversationMemory::new(10);
        let seq = memory.next_seq();
        memory.record(turn(seq, "tax question", Topic::Taxation));
        memory.reset();
        assert!(memory.is_empty());
        assert_eq!(memory.current_topic(), None);
        assert_eq!(memory.next_seq(), 0);
    }

    #[test]
    fn test_recent_context_order() {
        let mut memory = ConversationMemory::new(10);
        for i in 0..4 {
            memory.record(turn(i, &format!("q{i}"), Topic::Budget));
        }
        let recent = memory.recent_context(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].query, "q2");
        assert_eq!(recent[1].query, "q3");
    }
}
