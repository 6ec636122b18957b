//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is the only way the pipelines touch stored
//! chunks. Two backends implement it:
//!
//! - [`SqliteIndex`] — persistent, one SQLite table per database, entries
//!   partitioned by collection name.
//! - [`InMemoryIndex`] — process-local, for tests and throwaway runs.
//!
//! Both compare vectors with cosine distance (`1 - cos`, range `[0, 2]`)
//! and report `similarity = 1 - distance / 2`. A backend with a different
//! distance metric must re-derive that conversion.

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryIndex;
pub use sqlite::SqliteIndex;

use async_trait::async_trait;

use crate::config::MAX_UPSERT_BATCH;
use crate::embedding::cosine_similarity;
use crate::error::{RagError, Result};
use crate::models::{IndexEntry, IndexStats, SearchResult};

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace entries by id. Returns the number written.
    async fn upsert(&self, entries: &[IndexEntry]) -> Result<usize>;

    /// Nearest neighbours of `vector`, most similar first, at most `top_k`.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<SearchResult>>;

    /// Drop every entry and recreate the empty collection.
    async fn clear(&self) -> Result<()>;

    async fn stats(&self) -> Result<IndexStats>;
}

/// Cosine distance between two vectors, in `[0, 2]`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    (1.0 - cosine_similarity(a, b) as f64).clamp(0.0, 2.0)
}

/// Map a cosine distance onto a `[0, 1]` similarity score.
pub fn distance_to_similarity(distance: f64) -> f64 {
    1.0 - distance / 2.0
}

/// Build the stored id for one chunk of one ingestion run.
///
/// Characters outside `[A-Za-z0-9_-]` in the filename become `_`.
pub fn entry_id(filename: &str, run_id: &str, chunk_id: u64) -> String {
    let sanitized: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let run: String = run_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    format!("{}_{}_{}", sanitized, run, chunk_id)
}

/// Upsert `entries` in batches of at most `batch_size` (capped at 500).
///
/// Stops at the first failing batch and reports how many entries were
/// committed before it.
pub async fn upsert_in_batches(
    index: &dyn VectorIndex,
    entries: &[IndexEntry],
    batch_size: usize,
) -> Result<usize> {
    let batch_size = batch_size.clamp(1, MAX_UPSERT_BATCH);
    let mut committed = 0;

    for batch in entries.chunks(batch_size) {
        match index.upsert(batch).await {
            Ok(n) => committed += n,
            Err(e) => {
                return Err(RagError::PartialUpsert {
                    committed,
                    total: entries.len(),
                    message: e.to_string(),
                })
            }
        }
    }

    Ok(committed)
}

/// Score every candidate against `query`, sort descending, keep `top_k`.
///
/// Fails if any stored vector has a different length than `query`: the
/// index was built with another embedding model, or an entry is corrupt.
pub(crate) fn rank<'a, I>(query: &[f32], candidates: I, top_k: usize) -> Result<Vec<SearchResult>>
where
    I: IntoIterator<Item = &'a IndexEntry>,
{
    let mut scored = Vec::new();
    for entry in candidates {
        if entry.vector.len() != query.len() {
            return Err(RagError::Index(format!(
                "embedding dimension mismatch: query {}, stored {} (entry {}); clear the index after changing the embedding model",
                query.len(),
                entry.vector.len(),
                entry.id
            )));
        }
        scored.push(SearchResult {
            text: entry.text.clone(),
            metadata: entry.metadata.clone(),
            similarity_score: distance_to_similarity(cosine_distance(query, &entry.vector)),
        });
    }

    scored.sort_by(|a, b| {
        b.similarity_score
            .partial_cmp(&a.similarity_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(top_k);
    Ok(scored)
}
