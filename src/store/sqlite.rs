//! SQLite-backed [`VectorIndex`].
//!
//! Vectors are stored as little-endian f32 BLOBs next to the chunk text and
//! metadata. Queries load every vector of the collection and rank in Rust,
//! which is adequate for policy-sized corpora (thousands of chunks).

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use super::{rank, VectorIndex};
use crate::config::Config;
use crate::db;
use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::error::Result;
use crate::migrate;
use crate::models::{ChunkMetadata, IndexEntry, IndexStats, SearchResult};

pub struct SqliteIndex {
    pool: SqlitePool,
    collection: String,
}

impl SqliteIndex {
    /// Connect to the configured database, apply the schema, and make sure
    /// the configured collection exists.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;
        let index = Self::new(pool, config.index.collection.clone());
        index.ensure_collection().await?;
        Ok(index)
    }

    /// Wrap an already-migrated pool.
    pub fn new(pool: SqlitePool, collection: impl Into<String>) -> Self {
        Self {
            pool,
            collection: collection.into(),
        }
    }

    async fn ensure_collection(&self) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO collections (name, created_at) VALUES (?, ?)")
            .bind(&self.collection)
            .bind(chrono::Utc::now().timestamp())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn upsert(&self, entries: &[IndexEntry]) -> Result<usize> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO index_entries
                    (collection, id, text, token_count, filename, page_number,
                     section, chunk_index, embedding, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    text = excluded.text,
                    token_count = excluded.token_count,
                    filename = excluded.filename,
                    page_number = excluded.page_number,
                    section = excluded.section,
                    chunk_index = excluded.chunk_index,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&self.collection)
            .bind(&entry.id)
            .bind(&entry.text)
            .bind(entry.token_count as i64)
            .bind(&entry.metadata.filename)
            .bind(entry.metadata.page_number as i64)
            .bind(&entry.metadata.section)
            .bind(entry.metadata.chunk_index as i64)
            .bind(vec_to_blob(&entry.vector))
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(entries.len())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        let rows = sqlx::query(
            r#"
            SELECT id, text, token_count, filename, page_number, section,
                   chunk_index, embedding
            FROM index_entries
            WHERE collection = ?
            "#,
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await?;

        let entries: Vec<IndexEntry> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let token_count: i64 = row.get("token_count");
                let page_number: i64 = row.get("page_number");
                let chunk_index: i64 = row.get("chunk_index");
                IndexEntry {
                    id: row.get("id"),
                    text: row.get("text"),
                    token_count: token_count as usize,
                    metadata: ChunkMetadata {
                        filename: row.get("filename"),
                        page_number: page_number as u32,
                        section: row.get("section"),
                        chunk_index: chunk_index as u64,
                    },
                    vector: blob_to_vec(&blob),
                }
            })
            .collect();

        tracing::debug!(candidates = entries.len(), top_k, "vector query");
        rank(vector, &entries, top_k)
    }

    async fn clear(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM index_entries WHERE collection = ?")
            .bind(&self.collection)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM collections WHERE name = ?")
            .bind(&self.collection)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO collections (name, created_at) VALUES (?, ?)")
            .bind(&self.collection)
            .bind(chrono::Utc::now().timestamp())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn stats(&self) -> Result<IndexStats> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM index_entries WHERE collection = ?")
                .bind(&self.collection)
                .fetch_one(&self.pool)
                .await?;
        Ok(IndexStats {
            total_chunks: count as u64,
            collection_name: self.collection.clone(),
        })
    }
}
