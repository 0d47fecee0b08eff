//! Ollama embedding backend.
//!
//! [`OllamaEmbedder`] implements [`Embedder`] by calling
//! `POST {url}/api/embed` with `{model, input: [..]}` and reading back
//! `{embeddings: [[..]]}`. Inputs larger than `embed_batch_size` are split
//! into several requests; results keep input order.
//!
//! There are no retries and no request timeout: a failed call surfaces to
//! the caller, which aborts the build or reports the turn.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::debug;

use corpus_rag_core::embedding::Embedder;

use crate::config::ModelConfig;

/// Embedding backend for a local Ollama server.
pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    batch_size: usize,
}

impl OllamaEmbedder {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.url.trim_end_matches('/').to_string(),
            model: config.embedding_model().to_string(),
            batch_size: config.embed_batch_size.max(1),
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/api/embed", self.url))
            .json(&body)
            .send()
            .await
            .with_context(|| {
                format!(
                    "Ollama connection error (is Ollama running at {}?)",
                    self.url
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Ollama API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response
            .json()
            .await
            .context("Invalid Ollama response: body is not JSON")?;
        let vectors = parse_ollama_response(&json)?;

        if vectors.len() != texts.len() {
            bail!(
                "Ollama returned {} embeddings for {} inputs",
                vectors.len(),
                texts.len()
            );
        }
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            debug!(size = batch.len(), model = %self.model, "embedding batch");
            vectors.extend(self.embed_batch(batch).await?);
        }
        Ok(vectors)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing embeddings array"))?;

    let mut result = Vec::with_capacity(embeddings.len());
    for embedding in embeddings {
        let values = embedding
            .as_array()
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: embedding is not an array"))?;
        let vec = values
            .iter()
            .map(|v| {
                v.as_f64().map(|f| f as f32).ok_or_else(|| {
                    anyhow::anyhow!("Invalid Ollama response: non-numeric embedding value")
                })
            })
            .collect::<Result<Vec<f32>>>()?;
        result.push(vec);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_embeddings() {
        let json = serde_json::json!({
            "model": "mistral",
            "embeddings": [[0.5, -1.0], [0.0, 2.0]]
        });
        let vectors = parse_ollama_response(&json).unwrap();
        assert_eq!(vectors, vec![vec![0.5, -1.0], vec![0.0, 2.0]]);
    }

    #[test]
    fn test_parse_missing_embeddings() {
        let json = serde_json::json!({"error": "model 'nope' not found"});
        let err = parse_ollama_response(&json).unwrap_err();
        assert!(err.to_string().contains("missing embeddings"));
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        let json = serde_json::json!({"embeddings": [[1.0, "x"]]});
        assert!(parse_ollama_response(&json).is_err());
    }

    #[test]
    fn test_embedding_model_falls_back_to_generation_model() {
        let config = ModelConfig {
            url: "http://localhost:11434/".to_string(),
            ..ModelConfig::default()
        };
        let embedder = OllamaEmbedder::new(&config);
        assert_eq!(embedder.model_name(), "mistral");
        assert_eq!(embedder.url, "http://localhost:11434");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_error() {
        let config = ModelConfig {
            url: "http://127.0.0.1:9".to_string(),
            ..ModelConfig::default()
        };
        let embedder = OllamaEmbedder::new(&config);
        let err = embedder.embed_query("hello").await.unwrap_err();
        assert!(format!("{:#}", err).contains("Ollama connection error"));
    }
}
