//! In-process embedding cache.
//!
//! Keyed by the exact input text, unbounded, and lives as long as the
//! process (or until [`EmbeddingCache::clear`]). Entries are not tied to a
//! model version: switching models without clearing serves stale vectors.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::EmbeddingProvider;
use crate::error::Result;

#[derive(Default)]
pub struct EmbeddingCache {
    entries: Mutex<HashMap<String, Vec<f32>>>,
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, text: &str) -> Option<Vec<f32>> {
        self.entries.lock().ok()?.get(text).cloned()
    }

    pub fn set(&self, text: &str, vector: Vec<f32>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(text.to_string(), vector);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Wraps a provider so repeated texts skip the backend.
pub struct CachedProvider {
    inner: Box<dyn EmbeddingProvider>,
    cache: Arc<EmbeddingCache>,
}

impl CachedProvider {
    pub fn new(inner: Box<dyn EmbeddingProvider>, cache: Arc<EmbeddingCache>) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &Arc<EmbeddingCache> {
        &self.cache
    }
}

#[async_trait]
impl EmbeddingProvider for CachedProvider {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dims(&self) -> usize {
        self.inner.dims()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(hit) = self.cache.get(text) {
            return Ok(hit);
        }
        let vector = self.inner.embed(text).await?;
        self.cache.set(text, vector.clone());
        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out: Vec<Option<Vec<f32>>> = texts.iter().map(|t| self.cache.get(t)).collect();
        let misses: Vec<String> = texts
            .iter()
            .zip(&out)
            .filter(|(_, hit)| hit.is_none())
            .map(|(t, _)| t.clone())
            .collect();

        if !misses.is_empty() {
            tracing::debug!(hits = texts.len() - misses.len(), misses = misses.len(), "embedding cache");
            let mut fresh = self.inner.embed_batch(&misses).await?.into_iter();
            for (text, slot) in texts.iter().zip(out.iter_mut()) {
                if slot.is_none() {
                    if let Some(vector) = fresh.next() {
                        self.cache.set(text, vector.clone());
                        *slot = Some(vector);
                    }
                }
            }
        }

        out.into_iter()
            .map(|v| {
                v.ok_or_else(|| {
                    crate::error::RagError::Embedding(
                        "backend returned fewer vectors than inputs".to_string(),
                    )
                })
            })
            .collect()
    }
}
