//! In-memory [`VectorIndex`] for tests and throwaway runs.
//!
//! Entries live in a `Vec` behind `std::sync::RwLock`; search is a
//! brute-force scan.

use async_trait::async_trait;
use std::sync::RwLock;

use super::{rank, VectorIndex};
use crate::error::{RagError, Result};
use crate::models::{IndexEntry, IndexStats, SearchResult};

pub struct InMemoryIndex {
    collection: String,
    entries: RwLock<Vec<IndexEntry>>,
}

impl InMemoryIndex {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            entries: RwLock::new(Vec::new()),
        }
    }
}

fn poisoned<T>(_: T) -> RagError {
    RagError::Index("in-memory index lock poisoned".to_string())
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, entries: &[IndexEntry]) -> Result<usize> {
        let mut stored = self.entries.write().map_err(poisoned)?;
        for entry in entries {
            match stored.iter_mut().find(|e| e.id == entry.id) {
                Some(existing) => *existing = entry.clone(),
                None => stored.push(entry.clone()),
            }
        }
        Ok(entries.len())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        let stored = self.entries.read().map_err(poisoned)?;
        rank(vector, stored.iter(), top_k)
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().map_err(poisoned)?.clear();
        Ok(())
    }

    async fn stats(&self) -> Result<IndexStats> {
        let stored = self.entries.read().map_err(poisoned)?;
        Ok(IndexStats {
            total_chunks: stored.len() as u64,
            collection_name: self.collection.clone(),
        })
    }
}
