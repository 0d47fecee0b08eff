//! Document loader: corpus folder → [`RawDocument`]s.
//!
//! Files in the top level of the corpus folder are classified by extension
//! into [`DocumentSource`] variants; each variant knows how to parse itself.
//!
//! | Extension | Variant | Output |
//! |-----------|---------|--------|
//! | `.pdf` | [`DocumentSource::Pdf`] | one document per page, `unit_index` = 0-based page |
//! | `.txt` | [`DocumentSource::Text`] | one document, strict UTF-8, `unit_index` = 0 |
//!
//! Extensions match case-insensitively; anything else is ignored. A file
//! that fails to parse is skipped with a warning.

use anyhow::{Context, Result as AnyResult};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use corpus_rag_core::models::RawDocument;

use crate::error::{RagError, Result};

const UTF8_BOM: char = '\u{feff}';

/// A recognized corpus file, tagged by format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    Pdf(PathBuf),
    Text(PathBuf),
}

impl DocumentSource {
    /// Classify a file by extension. `None` for unsupported formats.
    pub fn classify(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(DocumentSource::Pdf(path.to_path_buf())),
            "txt" => Some(DocumentSource::Text(path.to_path_buf())),
            _ => None,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            DocumentSource::Pdf(p) | DocumentSource::Text(p) => p,
        }
    }

    /// Parse the file into ordered raw documents.
    pub fn parse(&self) -> AnyResult<Vec<RawDocument>> {
        match self {
            DocumentSource::Pdf(path) => parse_pdf(path),
            DocumentSource::Text(path) => parse_text(path),
        }
    }
}

fn parse_pdf(path: &Path) -> AnyResult<Vec<RawDocument>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes)
        .with_context(|| format!("PDF extraction failed for {}", path.display()))?;

    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(page, text)| RawDocument {
            source_path: path.to_path_buf(),
            unit_index: page as u32,
            text,
        })
        .collect())
}

fn parse_text(path: &Path) -> AnyResult<Vec<RawDocument>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let text = String::from_utf8(bytes)
        .with_context(|| format!("{} is not valid UTF-8", path.display()))?;
    let text = text.strip_prefix(UTF8_BOM).map(str::to_string).unwrap_or(text);

    Ok(vec![RawDocument {
        source_path: path.to_path_buf(),
        unit_index: 0,
        text,
    }])
}

/// List recognized files in the top level of `data_dir`, sorted by name.
///
/// # Errors
///
/// - [`RagError::Configuration`] if `data_dir` is missing or not a directory.
/// - [`RagError::NoDocumentsFound`] if it holds no recognized files.
pub fn discover_sources(data_dir: &Path) -> Result<Vec<DocumentSource>> {
    if !data_dir.exists() {
        return Err(RagError::Configuration(format!(
            "corpus folder '{}' does not exist: create it and put your .pdf or .txt documents in it",
            data_dir.display()
        )));
    }
    if !data_dir.is_dir() {
        return Err(RagError::Configuration(format!(
            "corpus path '{}' is not a folder",
            data_dir.display()
        )));
    }

    let mut sources = Vec::new();
    for entry in WalkDir::new(data_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(source) = DocumentSource::classify(entry.path()) {
            sources.push(source);
        }
    }

    if sources.is_empty() {
        return Err(RagError::NoDocumentsFound(data_dir.to_path_buf()));
    }

    Ok(sources)
}

/// Load every recognized file in `data_dir`.
///
/// Documents come out grouped by file (in file-name order) and, within a
/// PDF, in page order.
pub fn load_documents(data_dir: &Path) -> Result<Vec<RawDocument>> {
    let sources = discover_sources(data_dir)?;
    info!(count = sources.len(), "found documents to process");

    let mut docs = Vec::new();
    let mut loaded_files = 0usize;
    for source in &sources {
        info!(file = %source.path().display(), "loading");
        match source.parse() {
            Ok(mut parsed) => {
                loaded_files += 1;
                docs.append(&mut parsed);
            }
            Err(e) => warn!(file = %source.path().display(), "skipping unreadable file: {:#}", e),
        }
    }

    if loaded_files == 0 {
        return Err(RagError::NoDocumentsFound(data_dir.to_path_buf()));
    }

    Ok(docs)
}
