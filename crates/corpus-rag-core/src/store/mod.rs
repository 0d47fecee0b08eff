//! Vector store abstraction.
//!
//! The [`VectorStore`] trait is the read side of a vector index: count the
//! stored chunks and rank them against a query vector. Backends:
//!
//! | Backend | Where |
//! |---------|-------|
//! | [`memory::InMemoryStore`] | this crate; tests and ephemeral indexes |
//! | `SqliteVectorStore` | `corpus-rag`; the persisted index |
//!
//! Writing is backend-specific (the SQLite index is written once, during a
//! staged build), so it is not part of the trait.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::ScoredChunk;

/// Read-only similarity search over stored chunk vectors.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Number of chunks in the store.
    async fn count(&self) -> Result<usize>;

    /// Return the `k` chunks most similar to `query_vec`, ranked by
    /// [`rank_top_k`](crate::search::rank_top_k).
    async fn vector_search(&self, query_vec: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;
}
