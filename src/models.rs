//! Core data models.
//!
//! These types flow through the ingestion path (pages → chunks → index
//! entries) and the query path (search results → response).

use serde::{Deserialize, Serialize};
use std::fmt;

/// One ingested source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub filename: String,
    pub page_count: usize,
}

/// One page of a document, with its derived section label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number.
    pub page_number: u32,
    pub text: String,
    pub section: String,
}

/// Provenance carried by every chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub filename: String,
    pub page_number: u32,
    pub section: String,
    pub chunk_index: u64,
}

/// The atomic unit of storage, retrieval, and citation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Monotonic within one ingestion of one document.
    pub chunk_id: u64,
    pub text: String,
    pub token_count: usize,
    pub metadata: ChunkMetadata,
}

/// A chunk plus its embedding, as stored in the vector index.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub id: String,
    pub text: String,
    pub token_count: usize,
    pub metadata: ChunkMetadata,
    pub vector: Vec<f32>,
}

/// A nearest-neighbour hit. `similarity_score` is in `[0, 1]`.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub text: String,
    pub metadata: ChunkMetadata,
    pub similarity_score: f64,
}

/// Coarse trust label for the retrieved context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Confidence::High => "High",
            Confidence::Medium => "Medium",
            Confidence::Low => "Low",
        };
        f.write_str(s)
    }
}

/// A cited source in a [`Response`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub document: String,
    pub page: u32,
    pub section: String,
    pub similarity: f64,
}

/// The caller-facing answer to one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub answer: String,
    pub sources: Vec<Source>,
    pub confidence: Confidence,
    /// Number of chunks that passed the similarity threshold.
    pub context_chunks: usize,
}

/// Index size summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub total_chunks: u64,
    pub collection_name: String,
}
