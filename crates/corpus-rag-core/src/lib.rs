//! # corpus-rag core
//!
//! Pure, I/O-free logic shared by the corpus-rag application: data models,
//! the overlapping text chunker, the embedding trait, top-K ranking, and the
//! vector store abstraction.
//!
//! Nothing in this crate touches the filesystem, the network, or SQLite.
//! Those concerns live in the `corpus-rag` application crate.

pub mod chunk;
pub mod embedding;
pub mod models;
pub mod search;
pub mod store;
