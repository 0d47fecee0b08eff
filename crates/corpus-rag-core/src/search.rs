//! Top-K ranking shared by every [`VectorStore`](crate::store::VectorStore).
//!
//! Ordering is by descending score; equal scores are ordered by ascending
//! chunk id so results are reproducible across runs and backends. `NaN`
//! scores rank below everything else.

use std::cmp::Ordering;

use crate::models::ScoredChunk;

/// Sort `candidates` best-first and keep at most `k`.
pub fn rank_top_k(mut candidates: Vec<ScoredChunk>, k: usize) -> Vec<ScoredChunk> {
    candidates.sort_by(compare_ranked);
    candidates.truncate(k);
    candidates
}

/// Ranking order: higher score first, then lower chunk id.
pub fn compare_ranked(a: &ScoredChunk, b: &ScoredChunk) -> Ordering {
    rank_key(b.score)
        .total_cmp(&rank_key(a.score))
        .then_with(|| a.chunk.id.cmp(&b.chunk.id))
}

fn rank_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}
