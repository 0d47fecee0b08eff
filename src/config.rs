//! Configuration: TOML file, serde defaults, and validation.
//!
//! Every section is optional; a missing file section falls back to the
//! defaults below. A [`Config`] is built once at startup and passed by
//! reference into every component.
//!
//! ```toml
//! [paths]
//! data_dir = "dati"
//! persist_dir = "vector_db"
//!
//! [model]
//! name = "mistral"
//! url = "http://localhost:11434"
//! embed_batch_size = 32
//!
//! [chunking]
//! chunk_size = 1000
//! chunk_overlap = 150
//!
//! [retrieval]
//! k = 5
//!
//! [session]
//! exit_keyword = "esci"
//! ```
//!
//! Relative paths are resolved against the current working directory.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{RagError, Result};
use crate::prompt::{CONTEXT_PLACEHOLDER, DEFAULT_TEMPLATE, QUESTION_PLACEHOLDER};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    /// Folder holding the `.pdf` / `.txt` corpus.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Folder holding the persisted vector index.
    #[serde(default = "default_persist_dir")]
    pub persist_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            persist_dir: default_persist_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("dati")
}
fn default_persist_dir() -> PathBuf {
    PathBuf::from("vector_db")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// Generation model; also the embedding model unless `embedding_name` is set.
    #[serde(default = "default_model_name")]
    pub name: String,
    #[serde(default)]
    pub embedding_name: Option<String>,
    /// Base URL of the Ollama server.
    #[serde(default = "default_url")]
    pub url: String,
    /// Texts sent per embedding request while building the index.
    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,
}

impl ModelConfig {
    pub fn embedding_model(&self) -> &str {
        self.embedding_name.as_deref().unwrap_or(&self.name)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            embedding_name: None,
            url: default_url(),
            embed_batch_size: default_embed_batch_size(),
        }
    }
}

fn default_model_name() -> String {
    "mistral".to_string()
}
fn default_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_embed_batch_size() -> usize {
    32
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Maximum chunk length, in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks of one document.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    150
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Chunks retrieved per query.
    #[serde(default = "default_k")]
    pub k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { k: default_k() }
    }
}

fn default_k() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Input that ends the session, compared case-insensitively after trimming.
    #[serde(default = "default_exit_keyword")]
    pub exit_keyword: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            exit_keyword: default_exit_keyword(),
        }
    }
}

fn default_exit_keyword() -> String {
    "esci".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct PromptConfig {
    /// Persona template with `{context}` and `{question}` placeholders.
    #[serde(default = "default_template")]
    pub template: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            template: default_template(),
        }
    }
}

fn default_template() -> String {
    DEFAULT_TEMPLATE.to_string()
}

impl Config {
    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(invalid("chunking.chunk_size must be > 0"));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(invalid(
                "chunking.chunk_overlap must be smaller than chunking.chunk_size",
            ));
        }
        if self.retrieval.k == 0 {
            return Err(invalid("retrieval.k must be >= 1"));
        }
        if self.model.embed_batch_size == 0 {
            return Err(invalid("model.embed_batch_size must be >= 1"));
        }
        if self.model.name.trim().is_empty() {
            return Err(invalid("model.name must not be empty"));
        }
        if self.session.exit_keyword.trim().is_empty() {
            return Err(invalid("session.exit_keyword must not be empty"));
        }
        for placeholder in [CONTEXT_PLACEHOLDER, QUESTION_PLACEHOLDER] {
            if !self.prompt.template.contains(placeholder) {
                return Err(invalid(&format!(
                    "prompt.template must contain the {} placeholder",
                    placeholder
                )));
            }
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> RagError {
    RagError::Configuration(msg.to_string())
}

/// Load and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        RagError::Configuration(format!(
            "failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;
    parse_config(&content)
}

/// Parse and validate config text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)
        .map_err(|e| RagError::Configuration(format!("failed to parse config file: {}", e)))?;
    config.validate()?;
    Ok(config)
}
