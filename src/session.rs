//! Interactive question/answer loop.
//!
//! The loop is an explicit state machine:
//!
//! ```text
//! Idle ──▶ AwaitingInput ──┬─ blank line ────▶ NoOp ──────────▶ AwaitingInput
//!                          ├─ query ─────────▶ Processing ────▶ AwaitingInput
//!                          └─ exit / EOF / Ctrl-C ─▶ Terminated
//! ```
//!
//! A turn retrieves context, assembles the prompt, and streams the answer to
//! the output, flushing after every fragment. A backend failure during a
//! turn is reported and the loop asks for the next question. Cancellation is
//! observed while waiting for input, during retrieval, and between
//! fragments; whatever was already printed stays printed.

use futures::StreamExt;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::error::{RagError, Result};
use crate::generation::Generator;
use crate::prompt::PromptAssembler;
use crate::retriever::Retriever;

pub const QUESTION_PROMPT: &str = "\nFai la tua domanda: ";
pub const ANSWER_PREFIX: &str = "\nRisposta: ";
pub const EXIT_NOTICE: &str = "\nUscita in corso...";

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The user typed the exit keyword.
    Exited,
    /// Input reached end of file.
    EndOfInput,
    /// The cancellation token fired.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingInput,
    NoOp,
    Processing(String),
    Terminated(SessionEnd),
}

/// Classification of one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Empty,
    Exit,
    Query(String),
}

/// Classify a raw input line. The exit keyword matches after trimming,
/// ignoring case; a query is passed on untrimmed.
pub fn classify_input(line: &str, exit_keyword: &str) -> Input {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        Input::Empty
    } else if trimmed.to_lowercase() == exit_keyword.trim().to_lowercase() {
        Input::Exit
    } else {
        Input::Query(line.to_string())
    }
}

enum Turn {
    Completed,
    Cancelled,
}

pub struct Session {
    retriever: Retriever,
    assembler: PromptAssembler,
    generator: Arc<dyn Generator>,
    exit_keyword: String,
    cancel: CancellationToken,
}

impl Session {
    pub fn new(
        retriever: Retriever,
        assembler: PromptAssembler,
        generator: Arc<dyn Generator>,
        config: &SessionConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            retriever,
            assembler,
            generator,
            exit_keyword: config.exit_keyword.clone(),
            cancel,
        }
    }

    /// Run the dialogue until exit, end of input, or cancellation.
    ///
    /// Returns `Err` only for failures writing to `output` or reading
    /// `input`; backend failures are reported inline and the loop goes on.
    pub async fn run<R, W>(&self, input: R, output: &mut W) -> Result<SessionEnd>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        let mut state = SessionState::Idle;

        loop {
            state = match state {
                SessionState::Idle => SessionState::AwaitingInput,
                SessionState::AwaitingInput => {
                    write_flush(output, QUESTION_PROMPT).await?;
                    let line = tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => None,
                        line = lines.next_line() => Some(line?),
                    };
                    match line {
                        None => SessionState::Terminated(SessionEnd::Cancelled),
                        Some(None) => SessionState::Terminated(SessionEnd::EndOfInput),
                        Some(Some(line)) => match classify_input(&line, &self.exit_keyword) {
                            Input::Empty => SessionState::NoOp,
                            Input::Exit => SessionState::Terminated(SessionEnd::Exited),
                            Input::Query(query) => SessionState::Processing(query),
                        },
                    }
                }
                SessionState::NoOp => SessionState::AwaitingInput,
                SessionState::Processing(query) => match self.answer(&query, output).await {
                    Ok(Turn::Completed) => SessionState::AwaitingInput,
                    Ok(Turn::Cancelled) => SessionState::Terminated(SessionEnd::Cancelled),
                    Err(e @ RagError::Backend(_)) => {
                        warn!("turn failed: {}", e);
                        write_flush(output, &format!("\nErrore: {}\n", e)).await?;
                        SessionState::AwaitingInput
                    }
                    Err(e) => return Err(e),
                },
                SessionState::Terminated(end) => {
                    match end {
                        SessionEnd::Cancelled => write_flush(output, &format!("{}\n", EXIT_NOTICE)).await?,
                        SessionEnd::EndOfInput => write_flush(output, "\n").await?,
                        SessionEnd::Exited => {}
                    }
                    debug!(?end, "session ended");
                    return Ok(end);
                }
            };
        }
    }

    async fn answer<W>(&self, query: &str, output: &mut W) -> Result<Turn>
    where
        W: AsyncWrite + Unpin,
    {
        let chunks = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(Turn::Cancelled),
            chunks = self.retriever.retrieve(query) => chunks?,
        };
        debug!(k = self.retriever.k(), chunks = chunks.len(), "retrieved context");

        let prompt = self.assembler.assemble(&chunks, query);
        let mut fragments = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(Turn::Cancelled),
            stream = self.generator.generate_stream(&prompt) => stream?,
        };

        write_flush(output, ANSWER_PREFIX).await?;
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(Turn::Cancelled),
                next = fragments.next() => next,
            };
            match next {
                Some(Ok(fragment)) => write_flush(output, &fragment).await?,
                Some(Err(e)) => return Err(e),
                None => break,
            }
        }
        write_flush(output, "\n").await?;

        Ok(Turn::Completed)
    }
}

async fn write_flush<W>(output: &mut W, text: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    output.write_all(text.as_bytes()).await?;
    output.flush().await?;
    Ok(())
}
