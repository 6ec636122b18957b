//! Ingestion pipeline orchestration.
//!
//! Coordinates the per-document flow: read → extract → chunk → embed →
//! upsert. Documents are independent: a failure on one is logged, recorded
//! in its [`FileOutcome`], and the remaining documents still run. Within a
//! document the steps are sequential and a failure aborts that document only.
//!
//! Each ingestion of a document gets a fresh run id that is part of every
//! entry id, so re-ingesting a file without clearing adds a second copy of
//! its chunks under new ids.

use globset::{GlobBuilder, GlobMatcher};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::chunk::Chunker;
use crate::config::Config;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::extract::extract_pages;
use crate::models::IndexEntry;
use crate::store::{entry_id, upsert_in_batches, SqliteIndex, VectorIndex};

/// Result of ingesting one document.
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub filename: String,
    /// Pages with text.
    pub pages: usize,
    pub chunks_indexed: usize,
    /// Set when the document was skipped or only partly indexed.
    pub error: Option<String>,
}

impl FileOutcome {
    fn failed(filename: &str, error: impl ToString) -> Self {
        Self {
            filename: filename.to_string(),
            pages: 0,
            chunks_indexed: 0,
            error: Some(error.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    /// Total chunks in the collection after the run.
    pub total_chunks_indexed: u64,
    pub collection_name: String,
    pub files: Vec<FileOutcome>,
}

impl IngestReport {
    pub fn chunks_added(&self) -> usize {
        self.files.iter().map(|f| f.chunks_indexed).sum()
    }

    pub fn failed(&self) -> usize {
        self.files.iter().filter(|f| !f.is_ok()).count()
    }
}

pub struct Ingestor {
    chunker: Arc<Chunker>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    embed_batch_size: usize,
    upsert_batch_size: usize,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

/// Holds a filename in the in-flight set until dropped.
struct InFlight {
    set: Arc<Mutex<HashSet<String>>>,
    filename: String,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.filename);
        }
    }
}

/// A document waiting in an ingestion batch. Files on disk are read only
/// when their turn comes.
enum Pending {
    OnDisk(PathBuf),
    InMemory { filename: String, bytes: Vec<u8> },
}

impl Pending {
    fn filename(&self) -> String {
        match self {
            Pending::OnDisk(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string()),
            Pending::InMemory { filename, .. } => filename.clone(),
        }
    }

    async fn load(self) -> Result<Vec<u8>> {
        match self {
            Pending::OnDisk(path) => Ok(tokio::fs::read(&path).await?),
            Pending::InMemory { bytes, .. } => Ok(bytes),
        }
    }
}

impl Ingestor {
    /// Standalone ingestor over the configured embedding backend and SQLite
    /// index, for callers that never generate answers.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let chunker = Chunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap)?;
        let embedder = create_provider(&config.embedding)?;
        let index = SqliteIndex::open(config).await?;
        Ok(Self::new(
            Arc::new(chunker),
            Arc::from(embedder),
            Arc::new(index),
            config.embedding.batch_size,
            config.index.upsert_batch_size,
        ))
    }

    pub fn new(
        chunker: Arc<Chunker>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        embed_batch_size: usize,
        upsert_batch_size: usize,
    ) -> Self {
        Self {
            chunker,
            embedder,
            index,
            embed_batch_size: embed_batch_size.max(1),
            upsert_batch_size,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Ingest the given files, optionally clearing the collection first.
    ///
    /// Only a failed clear or a failed final stats read is returned as an
    /// error; per-file failures are reported in [`IngestReport::files`].
    pub async fn ingest_files(&self, paths: &[PathBuf], clear_first: bool) -> Result<IngestReport> {
        let documents = paths.iter().cloned().map(Pending::OnDisk).collect();
        self.run(documents, clear_first).await
    }

    /// Ingest in-memory documents keyed by filename.
    pub async fn ingest_bytes(
        &self,
        documents: Vec<(String, Vec<u8>)>,
        clear_first: bool,
    ) -> Result<IngestReport> {
        let documents = documents
            .into_iter()
            .map(|(filename, bytes)| Pending::InMemory { filename, bytes })
            .collect();
        self.run(documents, clear_first).await
    }

    /// Ingest every `*.pdf` under `dir`, in path order.
    pub async fn ingest_directory(&self, dir: &Path, clear_first: bool) -> Result<IngestReport> {
        let paths = find_pdfs(dir)?;
        tracing::info!(dir = %dir.display(), files = paths.len(), "scanning documents directory");
        self.ingest_files(&paths, clear_first).await
    }

    async fn run(
        &self,
        documents: Vec<Pending>,
        clear_first: bool,
    ) -> Result<IngestReport> {
        if clear_first {
            self.index.clear().await?;
            tracing::info!("index cleared before ingestion");
        }

        let mut files = Vec::with_capacity(documents.len());

        for document in documents {
            let filename = document.filename();
            let outcome = match document.load().await {
                Ok(bytes) => {
                    let run_id = Uuid::new_v4().to_string();
                    self.ingest_one(&filename, bytes, &run_id).await
                }
                Err(e) => FileOutcome::failed(&filename, e),
            };
            match &outcome.error {
                None => tracing::info!(
                    filename = %outcome.filename,
                    pages = outcome.pages,
                    chunks = outcome.chunks_indexed,
                    "ingested"
                ),
                Some(error) => tracing::warn!(filename = %outcome.filename, %error, "ingestion failed"),
            }
            files.push(outcome);
        }

        let stats = self.index.stats().await?;
        Ok(IngestReport {
            total_chunks_indexed: stats.total_chunks,
            collection_name: stats.collection_name,
            files,
        })
    }

    async fn ingest_one(&self, filename: &str, bytes: Vec<u8>, run_id: &str) -> FileOutcome {
        let _guard = match self.acquire(filename) {
            Some(guard) => guard,
            None => {
                return FileOutcome::failed(
                    filename,
                    format!("an ingestion of {} is already in progress", filename),
                )
            }
        };

        let (pages, entries) = match self.prepare(filename, bytes, run_id).await {
            Ok(prepared) => prepared,
            Err(e) => return FileOutcome::failed(filename, e),
        };

        match upsert_in_batches(self.index.as_ref(), &entries, self.upsert_batch_size).await {
            Ok(written) => FileOutcome {
                filename: filename.to_string(),
                pages,
                chunks_indexed: written,
                error: None,
            },
            Err(e) => {
                let committed = match &e {
                    RagError::PartialUpsert { committed, .. } => *committed,
                    _ => 0,
                };
                FileOutcome {
                    filename: filename.to_string(),
                    pages,
                    chunks_indexed: committed,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Extract, chunk, and embed one document. Nothing is written here.
    async fn prepare(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        run_id: &str,
    ) -> Result<(usize, Vec<IndexEntry>)> {
        let name = filename.to_string();
        let (document, pages) = tokio::task::spawn_blocking(move || extract_pages(&name, &bytes))
            .await
            .map_err(|e| RagError::Extraction {
                filename: filename.to_string(),
                message: format!("extractor crashed: {}", e),
            })??;

        tracing::debug!(
            filename,
            page_count = document.page_count,
            pages_with_text = pages.len(),
            "extracted"
        );

        let chunks = self.chunker.chunk_pages(&pages, filename);
        if chunks.is_empty() {
            tracing::warn!(filename, "no text chunks produced");
            return Ok((pages.len(), Vec::new()));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.embed_batch_size) {
            let embedded = self.embedder.embed_batch(batch).await?;
            if embedded.len() != batch.len() {
                return Err(RagError::Embedding(format!(
                    "expected {} vectors, got {}",
                    batch.len(),
                    embedded.len()
                )));
            }
            vectors.extend(embedded);
        }

        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry {
                id: entry_id(filename, run_id, chunk.chunk_id),
                text: chunk.text,
                token_count: chunk.token_count,
                metadata: chunk.metadata,
                vector,
            })
            .collect();

        Ok((pages.len(), entries))
    }

    fn acquire(&self, filename: &str) -> Option<InFlight> {
        let mut set = self.in_flight.lock().ok()?;
        if !set.insert(filename.to_string()) {
            return None;
        }
        Some(InFlight {
            set: self.in_flight.clone(),
            filename: filename.to_string(),
        })
    }
}

fn pdf_matcher() -> Result<GlobMatcher> {
    GlobBuilder::new("**/*.pdf")
        .case_insensitive(true)
        .literal_separator(false)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|e| RagError::Config(format!("invalid document glob: {}", e)))
}

/// All PDF files under `dir`, sorted.
pub fn find_pdfs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(RagError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("documents directory not found: {}", dir.display()),
        )));
    }

    let matcher = pdf_matcher()?;
    let mut paths = Vec::new();

    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
        if matcher.is_match(relative) {
            paths.push(entry.path().to_path_buf());
        }
    }

    paths.sort();
    Ok(paths)
}
