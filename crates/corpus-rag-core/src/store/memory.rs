//! In-memory [`VectorStore`] for tests and throwaway indexes.
//!
//! Brute-force cosine similarity over every stored vector.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{Chunk, ScoredChunk};
use crate::search::rank_top_k;

use super::VectorStore;

struct StoredVector {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// In-memory store keyed by chunk id.
#[derive(Default)]
pub struct InMemoryStore {
    vectors: RwLock<HashMap<String, StoredVector>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a chunk with its vector, replacing any entry with the same id.
    pub fn insert(&self, chunk: Chunk, vector: Vec<f32>) {
        let mut vectors = self.vectors.write().unwrap();
        vectors.insert(chunk.id.clone(), StoredVector { chunk, vector });
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn count(&self) -> Result<usize> {
        Ok(self.vectors.read().unwrap().len())
    }

    async fn vector_search(&self, query_vec: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let vectors = self.vectors.read().unwrap();
        let candidates = vectors
            .values()
            .map(|sv| ScoredChunk {
                chunk: sv.chunk.clone(),
                score: cosine_similarity(query_vec, &sv.vector),
            })
            .collect();
        Ok(rank_top_k(candidates, k))
    }
}
