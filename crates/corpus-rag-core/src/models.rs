//! Core data models used throughout corpus-rag.
//!
//! These types represent the documents, chunks, and scored search results
//! that flow through the indexing and query pipelines.

use std::path::PathBuf;

/// Raw text extracted from one unit of a source file.
///
/// A PDF yields one `RawDocument` per page (`unit_index` is the 0-based page
/// number); a plain-text file yields exactly one with `unit_index = 0`.
/// Only lives during ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub source_path: PathBuf,
    pub unit_index: u32,
    pub text: String,
}

/// A bounded, contiguous span of a [`RawDocument`].
///
/// `start_offset` and `length` are measured in characters of the unit's
/// text, not bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Deterministic UUIDv5 derived from source path, unit, and offset.
    pub id: String,
    pub source_path: String,
    pub unit_index: u32,
    /// Position of the chunk within its unit, contiguous from 0.
    pub chunk_index: u32,
    pub text: String,
    pub start_offset: usize,
    pub length: usize,
}

/// A chunk paired with its similarity to a query vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}
