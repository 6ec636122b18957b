//! Error taxonomy for the ingestion and query pipelines.
//!
//! Each variant maps to one recovery policy:
//!
//! | Variant | Raised by | Policy |
//! |---------|-----------|--------|
//! | [`RagError::Extraction`] | [`extract`](crate::extract) | skip the document, continue the batch |
//! | [`RagError::Embedding`] / [`RagError::EmbeddingsDisabled`] | [`embedding`](crate::embedding) | abort the file being ingested or the current query |
//! | [`RagError::Index`] / [`RagError::PartialUpsert`] | [`store`](crate::store) | abort the current operation |
//! | [`RagError::Generation`] | [`generation`](crate::generation) | absorbed into the answer text |
//!
//! Binary-level code (CLI, config loading, server bootstrap) uses `anyhow`
//! on top of these.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    /// The source document could not be parsed.
    #[error("extraction failed for {filename}: {message}")]
    Extraction { filename: String, message: String },

    /// The embedding backend was unavailable or rejected the input.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// No embedding backend is configured.
    #[error("embeddings are disabled; set [embedding] provider in config")]
    EmbeddingsDisabled,

    /// The vector index backend failed.
    #[error("index error: {0}")]
    Index(String),

    /// A batched upsert failed after some batches were committed.
    #[error("index upsert failed after committing {committed} of {total} entries: {message}")]
    PartialUpsert {
        committed: usize,
        total: usize,
        message: String,
    },

    /// The generation model call failed.
    #[error("generation failed: {0}")]
    Generation(String),

    /// A component was constructed with an unusable configuration.
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for RagError {
    fn from(e: sqlx::Error) -> Self {
        RagError::Index(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
