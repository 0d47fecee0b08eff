//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

use corpus_rag::config::Config;
use corpus_rag::index::STAGING_PREFIX;
use corpus_rag_core::embedding::Embedder;

pub const DIMS: usize = 64;

/// Deterministic bag-of-words embedder that counts its calls.
#[derive(Default)]
pub struct HashEmbedder {
    calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn embed_text(text: &str) -> Vec<f32> {
    let mut vec = vec![0.0f32; DIMS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        // FNV-1a over the lowercased word.
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in word.to_lowercase().bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        vec[(hash % DIMS as u64) as usize] += 1.0;
    }
    vec
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-test"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| embed_text(t)).collect())
    }
}

/// Embedder whose every call fails, as if the model server were down.
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing"
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        anyhow::bail!("connection refused")
    }
}

/// Embedder that never answers. On its first call it records whether a
/// staging directory exists under `watch_dir`, then fires `cancel`, as a
/// user pressing Ctrl-C while the corpus is being embedded.
pub struct StallingEmbedder {
    cancel: CancellationToken,
    watch_dir: PathBuf,
    saw_staging: AtomicBool,
}

impl StallingEmbedder {
    pub fn new(cancel: CancellationToken, watch_dir: &Path) -> Self {
        Self {
            cancel,
            watch_dir: watch_dir.to_path_buf(),
            saw_staging: AtomicBool::new(false),
        }
    }

    pub fn saw_staging(&self) -> bool {
        self.saw_staging.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for StallingEmbedder {
    fn model_name(&self) -> &str {
        "stalling"
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let staging = std::fs::read_dir(&self.watch_dir)?
            .filter_map(|e| e.ok())
            .any(|e| e.file_name().to_string_lossy().starts_with(STAGING_PREFIX));
        self.saw_staging.store(staging, Ordering::SeqCst);
        self.cancel.cancel();
        futures::future::pending().await
    }
}

/// Config rooted in `root`: corpus in `root/dati`, index in `root/vector_db`.
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.paths.data_dir = root.join("dati");
    config.paths.persist_dir = root.join("vector_db");
    config
}

pub fn write_corpus(root: &Path, files: &[(&str, &str)]) -> PathBuf {
    let dir = root.join("dati");
    std::fs::create_dir_all(&dir).unwrap();
    for (name, content) in files {
        std::fs::write(dir.join(name), content).unwrap();
    }
    dir
}

/// Minimal single-page PDF drawing `phrase`, with a correct xref table.
pub fn minimal_pdf_with_phrase(phrase: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", phrase);
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
            content.len(),
            content
        )
        .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}
