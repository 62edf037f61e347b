//! # Policy Chat
//!
//! A conversational question-answering library for a single financial
//! policy document.
//!
//! Policy Chat ingests the document once (chunking, embedding, persisting a
//! vector index in SQLite), then answers natural-language questions against
//! it: ambiguous follow-ups are rewritten using conversation state, the top
//! passages are retrieved by cosine similarity, and a topic-specific
//! template assembles the structured answer.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌───────────┐
//! │ Document │──▶│ Chunk+Embed  │──▶│  SQLite   │
//! │  (text)  │   │  (ingest)    │   │  vectors  │
//! └──────────┘   └──────────────┘   └─────┬─────┘
//!                                         │
//!    query ──▶ enhance ──▶ retrieve ──────┘
//!                │             │
//!            memory ◀── compose (topic templates)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! pchat init                        # create database
//! pchat ingest policy.txt           # chunk, embed, index
//! pchat ask "What is the budget situation?"
//! pchat chat                        # interactive session
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`errors`] | Error taxonomy |
//! | [`chunk`] | Boundary-aware text chunking |
//! | [`embedding`] | Embedding gateway abstraction |
//! | [`index`] | Persisted vector index |
//! | [`topic`] | Topic classification |
//! | [`memory`] | Bounded conversation memory |
//! | [`enhance`] | Ambiguous-query rewriting |
//! | [`retrieve`] | Similarity retrieval with thresholds |
//! | [`compose`] | Topic-template answer composition |
//! | [`session`] | Turn orchestration and session registry |
//! | [`ingest`] | Document ingestion pipeline |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chunk;
pub mod compose;
pub mod config;
pub mod db;
pub mod embedding;
pub mod enhance;
pub mod errors;
pub mod index;
pub mod ingest;
pub mod memory;
pub mod migrate;
pub mod models;
pub mod retrieve;
pub mod session;
pub mod topic;
