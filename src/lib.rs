//! # corpus-rag
//!
//! Ask questions about a local folder of PDF and text documents.
//!
//! On first start the documents are split into overlapping chunks, embedded
//! with a local Ollama model, and saved as a vector index. Later starts reuse
//! that index. Each question retrieves the most similar chunks, places them
//! in a persona prompt, and streams the model's answer to the terminal.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │   Loader    │──▶│ Chunk+Embed  │──▶│ SQLite index │
//! │  pdf / txt  │   │   (Ollama)   │   │ (persistent) │
//! └─────────────┘   └──────────────┘   └──────┬───────┘
//!                                             │
//!   question ──▶ Retriever ──▶ Prompt ──▶ Generator ──▶ streamed answer
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! mkdir dati && cp manuals/*.pdf dati/
//! rag                                  # builds ./vector_db on first run
//! rag --config ./config/rag.toml --model llama3
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`loader`] | Corpus folder → raw documents |
//! | [`embedding`] | Ollama embedding backend |
//! | [`db`] | Database connection |
//! | [`migrate`] | Index schema |
//! | [`index`] | Persistent vector index: open, build, search |
//! | [`retriever`] | Fixed-k retrieval |
//! | [`prompt`] | Prompt assembly |
//! | [`generation`] | Streaming answer generation |
//! | [`session`] | Interactive question loop |
//!
//! Chunking, the embedding trait, ranking, and the vector store trait live in
//! the `corpus-rag-core` crate.

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod loader;
pub mod migrate;
pub mod prompt;
pub mod retriever;
pub mod session;
