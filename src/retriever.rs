use std::sync::Arc;

use corpus_rag_core::models::Chunk;

use crate::error::Result;
use crate::index::VectorIndex;

/// Fixed-`k` similarity retrieval over a [`VectorIndex`].
///
/// Every call embeds the query again; nothing is cached.
#[derive(Clone)]
pub struct Retriever {
    index: Arc<VectorIndex>,
    k: usize,
}

impl Retriever {
    pub fn new(index: Arc<VectorIndex>, k: usize) -> Self {
        Self { index, k }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// The `k` chunks most relevant to `query`, best first.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<Chunk>> {
        let ranked = self.index.search(query, self.k).await?;
        Ok(ranked.into_iter().map(|s| s.chunk).collect())
    }
}
