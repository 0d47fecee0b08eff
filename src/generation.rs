//! Streaming answer generation.
//!
//! A [`Generator`] turns one prompt into a [`FragmentStream`]: an ordered,
//! finite, single-pass stream of text fragments whose concatenation is the
//! answer. Each call opens a new stream.
//!
//! [`OllamaGenerator`] calls `POST {url}/api/generate` with `stream: true`.
//! Ollama answers with newline-delimited JSON:
//!
//! ```text
//! {"model":"mistral","response":"Ciao","done":false}
//! {"model":"mistral","response":"!","done":false}
//! {"model":"mistral","response":"","done":true}
//! ```
//!
//! [`decode_generate_stream`] turns the raw byte stream into fragments,
//! yielding each one as soon as its line is complete. The stream fails with
//! [`RagError::Backend`] on a transport error, an `error` record, a line that
//! is not valid JSON, or if the bytes end before a `done: true` record.

use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use std::fmt::Display;
use std::pin::Pin;

use crate::config::ModelConfig;
use crate::error::{RagError, Result};

/// Ordered answer fragments; an `Err` item ends the stream.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[async_trait]
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;

    /// Start generating an answer for `prompt`.
    async fn generate_stream(&self, prompt: &str) -> Result<FragmentStream>;
}

/// Text generation against a local Ollama server.
pub struct OllamaGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl OllamaGenerator {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.url.trim_end_matches('/').to_string(),
            model: config.name.clone(),
        }
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate_stream(&self, prompt: &str) -> Result<FragmentStream> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": true,
        });

        let response = self
            .client
            .post(format!("{}/api/generate", self.url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                RagError::Backend(format!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    self.url, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(RagError::Backend(format!(
                "Ollama API error {}: {}",
                status, body_text
            )));
        }

        Ok(decode_generate_stream(response.bytes_stream()))
    }
}

#[derive(Debug, Deserialize)]
struct GenerateRecord {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Decode an Ollama `/api/generate` NDJSON byte stream into fragments.
///
/// Byte chunks may split lines (and UTF-8 sequences) anywhere. Empty
/// fragments are skipped; anything after the `done` record is ignored.
pub fn decode_generate_stream<S, B, E>(bytes: S) -> FragmentStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Display + Send,
{
    let decoder = NdjsonDecoder {
        inner: Box::pin(bytes),
        buf: Vec::new(),
        eof: false,
        finished: false,
    };

    Box::pin(stream::unfold(decoder, |mut decoder| async move {
        let item = decoder.next_fragment().await?;
        Some((item, decoder))
    }))
}

struct NdjsonDecoder<S> {
    inner: Pin<Box<S>>,
    buf: Vec<u8>,
    eof: bool,
    finished: bool,
}

impl<S, B, E> NdjsonDecoder<S>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    async fn next_fragment(&mut self) -> Option<Result<String>> {
        loop {
            if self.finished {
                return None;
            }

            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.buf.drain(..=pos).collect();
                match parse_line(&line) {
                    Ok(None) => continue,
                    Ok(Some(record)) => {
                        self.finished = record.done;
                        if !record.response.is_empty() {
                            return Some(Ok(record.response));
                        }
                        continue;
                    }
                    Err(e) => return Some(Err(self.fail(e))),
                }
            }

            if self.eof {
                let err = RagError::Backend(
                    "generation stream ended before the answer was complete".to_string(),
                );
                return Some(Err(self.fail(err)));
            }

            match self.inner.next().await {
                Some(Ok(chunk)) => self.buf.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    let err = RagError::Backend(format!("generation stream failed: {}", e));
                    return Some(Err(self.fail(err)));
                }
                None => {
                    self.eof = true;
                    // A last record without a trailing newline still counts.
                    if self.buf.iter().any(|b| !b.is_ascii_whitespace()) {
                        self.buf.push(b'\n');
                    }
                }
            }
        }
    }

    fn fail(&mut self, err: RagError) -> RagError {
        self.finished = true;
        err
    }
}

/// Parse one NDJSON line; `Ok(None)` for a blank line.
fn parse_line(line: &[u8]) -> Result<Option<GenerateRecord>> {
    let start = line.iter().position(|b| !b.is_ascii_whitespace());
    let end = line.iter().rposition(|b| !b.is_ascii_whitespace());
    let line = match (start, end) {
        (Some(start), Some(end)) => &line[start..=end],
        _ => return Ok(None),
    };

    let record: GenerateRecord = serde_json::from_slice(line)
        .map_err(|e| RagError::Backend(format!("malformed generation record: {}", e)))?;
    if let Some(message) = record.error {
        return Err(RagError::Backend(format!("Ollama error: {}", message)));
    }
    Ok(Some(record))
}
