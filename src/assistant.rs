//! The caller-facing facade: query, ingest, stats, clear.
//!
//! A [`PolicyAssistant`] is built once per process and shared (it is
//! `Send + Sync`); each call is an independent unit of work.

use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;

use crate::answer::{self, AnswerComposer};
use crate::chunk::Chunker;
use crate::config::Config;
use crate::embedding::{create_provider, CachedProvider, EmbeddingCache, EmbeddingProvider};
use crate::error::Result;
use crate::generation::{create_generator, Generator};
use crate::ingest::{IngestReport, Ingestor};
use crate::models::{IndexStats, Response};
use crate::retrieve::{Retrieval, Retriever};
use crate::store::{SqliteIndex, VectorIndex};

pub struct PolicyAssistant {
    index: Arc<dyn VectorIndex>,
    retriever: Retriever,
    composer: AnswerComposer,
    ingestor: Ingestor,
    cache: Option<Arc<EmbeddingCache>>,
    documents_dir: PathBuf,
}

impl PolicyAssistant {
    /// Wire the configured backends and open the SQLite index.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let provider = create_provider(&config.embedding).context("creating embedding provider")?;
        let generator = create_generator(&config.generation).context("creating generator")?;
        let index = SqliteIndex::open(config).await?;

        let cache = config.embedding.cache.then(|| Arc::new(EmbeddingCache::new()));
        let embedder: Arc<dyn EmbeddingProvider> = match &cache {
            Some(cache) => Arc::new(CachedProvider::new(provider, cache.clone())),
            None => Arc::from(provider),
        };

        tracing::info!(
            embedding = embedder.model_name(),
            generator = generator.name(),
            model = generator.model(),
            collection = %config.index.collection,
            "assistant ready"
        );

        let assistant = Self::new(config, embedder, Arc::new(index), Arc::from(generator))?;
        Ok(match cache {
            Some(cache) => assistant.with_embedding_cache(cache),
            None => assistant,
        })
    }

    /// Build from explicit backends.
    pub fn new(
        config: &Config,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        let chunker = Arc::new(Chunker::new(
            config.chunking.chunk_size,
            config.chunking.chunk_overlap,
        )?);

        Ok(Self {
            retriever: Retriever::new(embedder.clone(), index.clone(), config.retrieval.clone()),
            composer: AnswerComposer::new(generator),
            ingestor: Ingestor::new(
                chunker,
                embedder,
                index.clone(),
                config.embedding.batch_size,
                config.index.upsert_batch_size,
            ),
            index,
            cache: None,
            documents_dir: config.ingest.documents_dir.clone(),
        })
    }

    /// Let [`clear_embedding_cache`](Self::clear_embedding_cache) reach the
    /// cache behind a [`CachedProvider`] passed to [`new`](Self::new).
    pub fn with_embedding_cache(mut self, cache: Arc<EmbeddingCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Answer one question. Only embedding and index failures are errors.
    pub async fn ask(&self, question: &str) -> Result<Response> {
        match self.retriever.retrieve(question).await? {
            Retrieval::NoResults => Ok(answer::no_results_response()),
            Retrieval::BelowThreshold { .. } => Ok(answer::low_confidence_response()),
            Retrieval::Relevant { chunks, confidence } => {
                Ok(self.composer.compose(question, &chunks, confidence).await)
            }
        }
    }

    pub async fn ingest_files(&self, paths: &[PathBuf], clear_first: bool) -> Result<IngestReport> {
        self.ingestor.ingest_files(paths, clear_first).await
    }

    pub async fn ingest_bytes(
        &self,
        documents: Vec<(String, Vec<u8>)>,
        clear_first: bool,
    ) -> Result<IngestReport> {
        self.ingestor.ingest_bytes(documents, clear_first).await
    }

    /// Ingest every PDF in the configured documents directory.
    pub async fn ingest_all(&self, clear_first: bool) -> Result<IngestReport> {
        self.ingestor
            .ingest_directory(&self.documents_dir, clear_first)
            .await
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        self.index.stats().await
    }

    /// Irreversibly drop every indexed chunk.
    pub async fn clear(&self) -> Result<()> {
        self.index.clear().await?;
        tracing::info!("index cleared");
        Ok(())
    }

    pub fn clear_embedding_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }
}
