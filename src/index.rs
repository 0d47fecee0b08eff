//! Persistent vector index.
//!
//! The index lives in `persist_dir` as a single SQLite file
//! ([`db::INDEX_FILE`]) holding every chunk, its embedding, and the build
//! parameters. It is written once and then only read.
//!
//! # Lifecycle
//!
//! ```text
//! persist_dir non-empty ──▶ open read-only (no embedding calls)
//! otherwise ──▶ load ──▶ chunk ──▶ embed ──▶ write staging dir ──▶ rename onto persist_dir
//! ```
//!
//! The staging directory is created next to `persist_dir` and removed on any
//! failure, so an interrupted or failed build never leaves a half-written
//! index behind.
//!
//! There is no lock on `persist_dir`: two processes building the same index
//! at once may race on the final rename.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use corpus_rag_core::chunk::chunk_documents;
use corpus_rag_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob, Embedder};
use corpus_rag_core::models::{Chunk, ScoredChunk};
use corpus_rag_core::search::rank_top_k;
use corpus_rag_core::store::VectorStore;

use crate::config::Config;
use crate::db;
use crate::error::{RagError, Result};
use crate::loader;
use crate::migrate;

/// Name prefix of the temporary directory an index is built in.
pub const STAGING_PREFIX: &str = ".rag-index-staging-";

/// [`VectorStore`] over a finished index database, opened read-only.
pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    pub async fn open(db_path: &Path) -> Result<Self> {
        let pool = db::connect(db_path, true).await?;
        Ok(Self { pool })
    }

    /// Read one build parameter from `index_meta`.
    pub async fn meta(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM index_meta WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value)
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn count(&self) -> anyhow::Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn vector_search(&self, query_vec: &[f32], k: usize) -> anyhow::Result<Vec<ScoredChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.source_path, c.unit_index, c.chunk_index,
                   c.start_offset, c.length, c.text, v.embedding
            FROM chunks c
            JOIN chunk_vectors v ON v.chunk_id = c.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let candidates = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let score = cosine_similarity(query_vec, &blob_to_vec(&blob));
                ScoredChunk {
                    chunk: Chunk {
                        id: row.get("id"),
                        source_path: row.get("source_path"),
                        unit_index: row.get::<i64, _>("unit_index") as u32,
                        chunk_index: row.get::<i64, _>("chunk_index") as u32,
                        start_offset: row.get::<i64, _>("start_offset") as usize,
                        length: row.get::<i64, _>("length") as usize,
                        text: row.get("text"),
                    },
                    score,
                }
            })
            .collect();

        Ok(rank_top_k(candidates, k))
    }
}

/// A queryable index: stored chunk vectors plus the embedder that made them.
pub struct VectorIndex {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl VectorIndex {
    /// Wrap an existing store, e.g. an in-memory one in tests.
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    /// Reuse the index in `paths.persist_dir` if there is one, otherwise
    /// build it from `paths.data_dir`.
    pub async fn open_or_build(config: &Config, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let persist_dir = &config.paths.persist_dir;
        if persist_dir.exists() {
            if !persist_dir.is_dir() {
                return Err(RagError::Configuration(format!(
                    "index path '{}' exists and is not a folder",
                    persist_dir.display()
                )));
            }
            if has_entries(persist_dir)? {
                return Self::open(persist_dir, embedder).await;
            }
        }
        Self::build(config, embedder).await
    }

    /// Like [`open_or_build`](Self::open_or_build), but gives up with
    /// [`RagError::UserAbort`] as soon as `cancel` fires. An abandoned build
    /// leaves neither the index nor its staging directory behind.
    pub async fn open_or_build_cancellable(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RagError::UserAbort),
            index = Self::open_or_build(config, embedder) => index,
        }
    }

    /// Open a previously built index. Makes no embedding calls.
    pub async fn open(persist_dir: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let db_path = persist_dir.join(db::INDEX_FILE);
        if !db_path.is_file() {
            return Err(RagError::Configuration(format!(
                "'{}' is not empty but holds no index; remove it to rebuild",
                persist_dir.display()
            )));
        }

        let store = SqliteVectorStore::open(&db_path).await?;
        if let Some(model) = store.meta("model").await? {
            if model != embedder.model_name() {
                warn!(
                    index_model = %model,
                    model = %embedder.model_name(),
                    "index was built with a different embedding model; delete it to rebuild"
                );
            }
        }
        let count = store.count().await.map_err(RagError::backend)?;
        info!(path = %persist_dir.display(), chunks = count, "loaded existing index");

        Ok(Self::new(Arc::new(store), embedder))
    }

    /// Build the index from the corpus and publish it at `paths.persist_dir`.
    pub async fn build(config: &Config, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let persist_dir = &config.paths.persist_dir;
        info!(path = %persist_dir.display(), "creating new index");

        let docs = loader::load_documents(&config.paths.data_dir)?;
        let chunks = chunk_documents(
            &docs,
            config.chunking.chunk_size,
            config.chunking.chunk_overlap,
        );
        info!(documents = docs.len(), chunks = chunks.len(), "split documents into chunks");
        if chunks.is_empty() {
            return Err(RagError::NoDocumentsFound(config.paths.data_dir.clone()));
        }

        // Dropped (and deleted) on any early return or cancellation.
        let parent = staging_parent(persist_dir);
        std::fs::create_dir_all(&parent)?;
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&parent)?;

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed(&texts).await.map_err(RagError::backend)?;
        let dims = check_vectors(&vectors, chunks.len())?;

        let meta = vec![
            ("model", embedder.model_name().to_string()),
            ("dims", dims.to_string()),
            ("chunk_size", config.chunking.chunk_size.to_string()),
            ("chunk_overlap", config.chunking.chunk_overlap.to_string()),
            ("chunk_count", chunks.len().to_string()),
            ("built_at", chrono::Utc::now().to_rfc3339()),
        ];

        write_index(&staging.path().join(db::INDEX_FILE), &chunks, &vectors, &meta).await?;

        // An empty directory left in place would block the rename.
        if persist_dir.exists() {
            std::fs::remove_dir(persist_dir)?;
        }
        std::fs::rename(staging.path(), persist_dir)?;
        info!(path = %persist_dir.display(), chunks = chunks.len(), "index saved");

        Self::open(persist_dir, embedder).await
    }

    /// The `k` chunks most similar to `query`, best first.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let query_vec = self
            .embedder
            .embed_query(query)
            .await
            .map_err(RagError::backend)?;
        self.store
            .vector_search(&query_vec, k)
            .await
            .map_err(RagError::backend)
    }

    pub async fn chunk_count(&self) -> Result<usize> {
        self.store.count().await.map_err(RagError::backend)
    }
}

fn has_entries(dir: &Path) -> Result<bool> {
    Ok(std::fs::read_dir(dir)?.next().is_some())
}

fn staging_parent(persist_dir: &Path) -> PathBuf {
    match persist_dir.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Check there is one vector per chunk and all share a dimension; returns it.
fn check_vectors(vectors: &[Vec<f32>], expected: usize) -> Result<usize> {
    if vectors.len() != expected {
        return Err(RagError::Backend(format!(
            "embedder returned {} vectors for {} chunks",
            vectors.len(),
            expected
        )));
    }
    let dims = vectors.first().map(Vec::len).unwrap_or(0);
    if dims == 0 || vectors.iter().any(|v| v.len() != dims) {
        return Err(RagError::Backend(
            "embedder returned empty or inconsistent vectors".to_string(),
        ));
    }
    Ok(dims)
}

async fn write_index(
    db_path: &Path,
    chunks: &[Chunk],
    vectors: &[Vec<f32>],
    meta: &[(&str, String)],
) -> Result<()> {
    let pool = db::connect(db_path, false).await?;
    migrate::run_migrations(&pool).await?;

    let mut tx = pool.begin().await?;
    for (chunk, vector) in chunks.iter().zip(vectors) {
        sqlx::query(
            r#"
            INSERT INTO chunks (id, source_path, unit_index, chunk_index, start_offset, length, text)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&chunk.id)
        .bind(&chunk.source_path)
        .bind(chunk.unit_index as i64)
        .bind(chunk.chunk_index as i64)
        .bind(chunk.start_offset as i64)
        .bind(chunk.length as i64)
        .bind(&chunk.text)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO chunk_vectors (chunk_id, embedding) VALUES (?, ?) ON CONFLICT(chunk_id) DO NOTHING",
        )
        .bind(&chunk.id)
        .bind(vec_to_blob(vector))
        .execute(&mut *tx)
        .await?;
    }

    for (key, value) in meta {
        sqlx::query("INSERT INTO index_meta (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    pool.close().await;
    Ok(())
}
