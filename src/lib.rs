//! # Policy RAG
//!
//! Grounded question answering over organizational policy PDFs.
//!
//! Documents are split into token-bounded, provenance-tagged chunks,
//! embedded, and stored in a vector index. A question is embedded, matched
//! against the index, gated by a similarity threshold, and answered by a
//! generation model that may only use the retrieved text.
//!
//! ## Architecture
//!
//! ```text
//!  ingestion:  PDF ─▶ extract ─▶ chunk ─▶ embed ─▶ ┌──────────────┐
//!                                                  │ vector index │
//!  query:      question ─▶ expand ─▶ embed ─▶ search ─▶ threshold ─┘
//!                                   │
//!                                   ▼
//!                     confidence ─▶ prompt ─▶ generate ─▶ Response
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! polrag init                          # create the index database
//! polrag ingest ./uploads/hr.pdf       # index one document
//! polrag ingest --clear                # re-index the documents directory
//! polrag ask "How many days of annual leave do I get?"
//! polrag serve                         # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Core data types |
//! | [`extract`] | Per-page PDF text and section labels |
//! | [`chunk`] | Token-window chunking |
//! | [`embedding`] | Embedding provider abstraction and cache |
//! | [`store`] | Vector index trait, SQLite and in-memory backends |
//! | [`retrieve`] | Query expansion, threshold, confidence |
//! | [`generation`] | Generation backends |
//! | [`answer`] | Prompt assembly and response packaging |
//! | [`ingest`] | Ingestion pipeline |
//! | [`assistant`] | Caller-facing facade |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod answer;
pub mod assistant;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generation;
mod http;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod retrieve;
pub mod server;
pub mod store;

pub use assistant::PolicyAssistant;
pub use error::{RagError, Result};
