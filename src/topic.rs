//! Topic enumeration and keyword-based classification.
//!
//! Every query is classified into one of a fixed set of topics; each topic
//! maps to exactly one response template, with [`Topic::General`] as the
//! fallback so template lookup can never miss. Classification is a pure
//! function returning a ranked candidate list with explicit tie-break
//! rules, so it stays testable:
//!
//! 1. Score each topic by how many of its keywords occur in the lowercased
//!    query text (substring match, so "risks" still hits "risk").
//! 2. Highest score wins.
//! 3. On a tie, prefer the session's current topic if it is among the tied
//!    candidates, else the first tied topic in [`Topic::ALL`] order.

use std::collections::HashMap;

use serde::Serialize;

/// Subject categories recognized in the financial policy document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    Budget,
    Debt,
    Infrastructure,
    Taxation,
    Superannuation,
    Risk,
    General,
}

impl Topic {
    /// All topics in fixed priority order (used for tie-breaking).
    pub const ALL: [Topic; 7] = [
        Topic::Budget,
        Topic::Debt,
        Topic::Infrastructure,
        Topic::Taxation,
        Topic::Superannuation,
        Topic::Risk,
        Topic::General,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Topic::Budget => "budget",
            Topic::Debt => "debt",
            Topic::Infrastructure => "infrastructure",
            Topic::Taxation => "taxation",
            Topic::Superannuation => "superannuation",
            Topic::Risk => "risk",
            Topic::General => "general",
        }
    }

    /// Parse a topic name as used in config keyword overrides.
    pub fn from_name(name: &str) -> Option<Topic> {
        Topic::ALL.iter().copied().find(|t| t.name() == name)
    }

    /// Built-in keyword set for this topic.
    fn default_keywords(&self) -> &'static [&'static str] {
        match self {
            Topic::Budget => &[
                "budget",
                "surplus",
                "deficit",
                "revenue",
                "expenses",
                "operating",
            ],
            Topic::Debt => &["debt", "borrowing", "borrowings", "interest", "creditor"],
            Topic::Infrastructure => {
                &["infrastructure", "capital", "construction", "works", "projects"]
            }
            Topic::Taxation => &["taxation", "tax", "gsp", "burden"],
            Topic::Superannuation => &["superannuation", "pension", "funding", "liabilities"],
            Topic::Risk => &["risk", "assessment", "mitigation", "management", "prudent"],
            Topic::General => &[],
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-topic keyword sets, built from defaults plus config overrides.
#[derive(Debug, Clone)]
pub struct TopicLexicon {
    keywords: HashMap<Topic, Vec<String>>,
}

impl TopicLexicon {
    /// Build the lexicon from built-in keyword sets, applying any per-topic
    /// overrides (keyed by topic name, as in the `[topics]` config table).
    pub fn new(overrides: &HashMap<String, Vec<String>>) -> Self {
        let mut keywords = HashMap::new();
        for topic in Topic::ALL {
            let words = match overrides.get(topic.name()) {
                Some(custom) => custom.iter().map(|w| w.to_lowercase()).collect(),
                None => topic
                    .default_keywords()
                    .iter()
                    .map(|w| (*w).to_string())
                    .collect(),
            };
            keywords.insert(topic, words);
        }
        Self { keywords }
    }

    pub fn keywords(&self, topic: Topic) -> &[String] {
        self.keywords.get(&topic).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Rank topics by keyword hits in `text`, highest first. Topics with
    /// zero hits are omitted; ties keep [`Topic::ALL`] order (stable sort).
    pub fn classify(&self, text: &str) -> Vec<(Topic, usize)> {
        let lower = text.to_lowercase();
        let mut ranked: Vec<(Topic, usize)> = Topic::ALL
            .iter()
            .filter_map(|topic| {
                let hits = self
                    .keywords(*topic)
                    .iter()
                    .filter(|kw| lower.contains(kw.as_str()))
                    .count();
                (hits > 0).then_some((*topic, hits))
            })
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }

    /// Resolve `text` to a single topic, applying the tie-break rules.
    /// Falls back to [`Topic::General`] when no keyword matches.
    pub fn resolve(&self, text: &str, current: Option<Topic>) -> Topic {
        let ranked = self.classify(text);
        let Some(&(best, best_score)) = ranked.first() else {
            return Topic::General;
        };
        if let Some(cur) = current {
            let tied = ranked.iter().any(|&(t, s)| t == cur && s == best_score);
            if tied {
                return cur;
            }
        }
        best
    }

    /// True when any recognized topic keyword occurs in `text`. Used by the
    /// query enhancer's ambiguity check.
    pub fn overlaps_vocabulary(&self, text: &str) -> bool {
        !self.classify(text).is_empty()
    }
}

impl Default for TopicLexicon {
    fn default() -> Self {
        Self::new(&HashMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_single_topic() {
        let lex = TopicLexicon::default();
        let ranked = lex.classify("What is the budget deficit this year?");
        assert_eq!(ranked[0].0, Topic::Budget);
        assert_eq!(ranked[0].1, 2);
    }

    #[test]
    fn test_classify_substring_match() {
        let lex = TopicLexicon::default();
        // "risks" should still hit the "risk" keyword.
        let ranked = lex.classify("What are the financial risks?");
        assert_eq!(ranked[0].0, Topic::Risk);
    }

    #[test]
    fn test_resolve_no_match_is_general() {
        let lex = TopicLexicon::default();
        assert_eq!(lex.resolve("hello there", None), Topic::General);
    }

    #[test]
    fn test_resolve_tie_prefers_current_topic() {
        let lex = TopicLexicon::default();
        // "capital funding" hits infrastructure and superannuation once each.
        let ranked = lex.classify("capital funding");
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].1, ranked[1].1);

        assert_eq!(
            lex.resolve("capital funding", Some(Topic::Superannuation)),
            Topic::Superannuation
        );
        // Without a current topic, priority order wins.
        assert_eq!(lex.resolve("capital funding", None), Topic::Infrastructure);
    }

    #[test]
    fn test_resolve_current_topic_not_tied_is_ignored() {
        let lex = TopicLexicon::default();
        assert_eq!(
            lex.resolve("tell me about the budget surplus", Some(Topic::Risk)),
            Topic::Budget
        );
    }

    #[test]
    fn test_keyword_overrides_replace_defaults() {
        let mut overrides = HashMap::new();
        overrides.insert("budget".to_string(), vec!["appropriation".to_string()]);
        let lex = TopicLexicon::new(&overrides);
        assert_eq!(
            lex.resolve("the annual appropriation bill", None),
            Topic::Budget
        );
        assert_eq!(lex.resolve("the budget surplus", None), Topic::General);
    }
}
