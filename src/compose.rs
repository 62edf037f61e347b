//! Template-driven answer composition.
//!
//! Composition is template filling, not generation: each topic maps to one
//! declarative [`TopicTemplate`] describing the summary lead and which
//! labelled sections to emit, and sections are filled by excerpting the
//! retrieved passages verbatim or by pulling typed fields out of them
//! (dollar figures, percentages, fiscal years). The highest-scoring passage
//! is always present in the answer. Empty results produce a fixed
//! insufficient-information answer with zero citations rather than
//! fabricated content.

use regex_lite::Regex;
use std::sync::OnceLock;

use crate::models::{Answer, AnswerSection, RetrievalResult};
use crate::topic::Topic;

/// Maximum excerpt length in bytes before truncation with an ellipsis.
const EXCERPT_LEN: usize = 240;

/// How a section pulls its lines out of the retrieved passages.
#[derive(Debug, Clone, Copy)]
enum Extraction {
    /// Verbatim passage excerpts, best first.
    Excerpts,
    /// Dollar amounts such as `$91.5m` or `$1,200`.
    Figures,
    /// Percentage figures such as `4.5%`.
    Percentages,
    /// Fiscal years such as `2005-06` or `2008`.
    FiscalYears,
}

struct SectionSpec {
    label: &'static str,
    extract: Extraction,
}

/// Declarative description of one topic's answer shape.
pub struct TopicTemplate {
    pub title: &'static str,
    summary_lead: &'static str,
    sections: &'static [SectionSpec],
}

static BUDGET: TopicTemplate = TopicTemplate {
    title: "Budget Overview",
    summary_lead: "The policy document sets out the budget position as follows.",
    sections: &[
        SectionSpec {
            label: "From the document",
            extract: Extraction::Excerpts,
        },
        SectionSpec {
            label: "Key figures",
            extract: Extraction::Figures,
        },
        SectionSpec {
            label: "Periods covered",
            extract: Extraction::FiscalYears,
        },
    ],
};

static DEBT: TopicTemplate = TopicTemplate {
    title: "Debt Management",
    summary_lead: "The document describes the debt and borrowings position as follows.",
    sections: &[
        SectionSpec {
            label: "From the document",
            extract: Extraction::Excerpts,
        },
        SectionSpec {
            label: "Key figures",
            extract: Extraction::Figures,
        },
    ],
};

static INFRASTRUCTURE: TopicTemplate = TopicTemplate {
    title: "Infrastructure Investment",
    summary_lead: "The document covers capital works and infrastructure as follows.",
    sections: &[
        SectionSpec {
            label: "From the document",
            extract: Extraction::Excerpts,
        },
        SectionSpec {
            label: "Program figures",
            extract: Extraction::Figures,
        },
    ],
};

static TAXATION: TopicTemplate = TopicTemplate {
    title: "Taxation Policy",
    summary_lead: "The document addresses taxation as follows.",
    sections: &[
        SectionSpec {
            label: "From the document",
            extract: Extraction::Excerpts,
        },
        SectionSpec {
            label: "Rates and shares",
            extract: Extraction::Percentages,
        },
    ],
};

static SUPERANNUATION: TopicTemplate = TopicTemplate {
    title: "Superannuation",
    summary_lead: "The document covers superannuation liabilities and funding as follows.",
    sections: &[
        SectionSpec {
            label: "From the document",
            extract: Extraction::Excerpts,
        },
        SectionSpec {
            label: "Funding levels",
            extract: Extraction::Percentages,
        },
        SectionSpec {
            label: "Key figures",
            extract: Extraction::Figures,
        },
    ],
};

static RISK: TopicTemplate = TopicTemplate {
    title: "Risk Management",
    summary_lead: "The document describes financial risk management as follows.",
    sections: &[SectionSpec {
        label: "From the document",
        extract: Extraction::Excerpts,
    }],
};

static GENERAL: TopicTemplate = TopicTemplate {
    title: "Policy Overview",
    summary_lead: "The most relevant passages of the policy document are below.",
    sections: &[SectionSpec {
        label: "From the document",
        extract: Extraction::Excerpts,
    }],
};

/// The template for `topic`. Total: every topic resolves, General included.
pub fn template_for(topic: Topic) -> &'static TopicTemplate {
    match topic {
        Topic::Budget => &BUDGET,
        Topic::Debt => &DEBT,
        Topic::Infrastructure => &INFRASTRUCTURE,
        Topic::Taxation => &TAXATION,
        Topic::Superannuation => &SUPERANNUATION,
        Topic::Risk => &RISK,
        Topic::General => &GENERAL,
    }
}

/// Build a structured answer from retrieved passages.
pub fn compose(results: &[RetrievalResult], topic: Topic) -> Answer {
    if results.is_empty() {
        return insufficient(topic);
    }

    let template = template_for(topic);
    let sections: Vec<AnswerSection> = template
        .sections
        .iter()
        .filter_map(|spec| {
            let lines = match spec.extract {
                Extraction::Excerpts => results.iter().map(|r| excerpt(&r.text)).collect(),
                Extraction::Figures => extract_all(results, figure_pattern()),
                Extraction::Percentages => extract_all(results, percent_pattern()),
                Extraction::FiscalYears => extract_all(results, fiscal_year_pattern()),
            };
            (!lines.is_empty()).then(|| AnswerSection {
                label: spec.label.to_string(),
                lines,
            })
        })
        .collect();

    Answer {
        topic,
        summary: format!("{} {}", template.title, template.summary_lead),
        sections,
        citations: results.iter().map(|r| r.chunk_id.clone()).collect(),
    }
}

/// The fixed answer used when retrieval found nothing relevant.
pub fn insufficient(topic: Topic) -> Answer {
    Answer {
        topic,
        summary: "The policy document does not contain enough information to answer this \
                  question."
            .to_string(),
        sections: Vec::new(),
        citations: Vec::new(),
    }
}

/// Truncate a passage to [`EXCERPT_LEN`] on a char boundary, collapsing
/// internal newlines.
fn excerpt(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.len() <= EXCERPT_LEN {
        return flat;
    }
    let mut end = EXCERPT_LEN;
    while !flat.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &flat[..end])
}

/// Matches of `pattern` across all passages, best passage first,
/// deduplicated preserving order.
fn extract_all(results: &[RetrievalResult], pattern: &Regex) -> Vec<String> {
    let mut seen = Vec::new();
    for r in results {
        for m in pattern.find_iter(&r.text) {
            let s = m.as_str().to_string();
            if !seen.contains(&s) {
                seen.push(s);
            }
        }
    }
    seen
}

fn figure_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$[0-9][0-9,]*(?:\.[0-9]+)?[mMbB]?").unwrap())
}

fn percent_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9]+(?:\.[0-9]+)?%").unwrap())
}

fn fiscal_year_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b20[0-9]{2}(?:-[0-9]{2})?\b").unwrap())
}
