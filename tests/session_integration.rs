mod common;

use async_trait::async_trait;
use futures::stream;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

use corpus_rag::config::SessionConfig;
use corpus_rag::error::{RagError, Result};
use corpus_rag::generation::{FragmentStream, Generator};
use corpus_rag::index::VectorIndex;
use corpus_rag::prompt::PromptAssembler;
use corpus_rag::retriever::Retriever;
use corpus_rag::session::{Session, SessionEnd, ANSWER_PREFIX, EXIT_NOTICE, QUESTION_PROMPT};
use corpus_rag_core::models::Chunk;
use corpus_rag_core::store::memory::InMemoryStore;

use common::{embed_text, test_config, write_corpus, HashEmbedder};

enum Reply {
    Fragments(Vec<&'static str>),
    FailToStart,
    FailMidStream(Vec<&'static str>),
    CancelMidStream(Vec<&'static str>, CancellationToken),
}

/// Generator that plays back scripted replies and records every prompt.
#[derive(Default)]
struct ScriptedGenerator {
    replies: Mutex<VecDeque<Reply>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    fn with_replies(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

fn fragments(parts: Vec<&'static str>) -> Vec<Result<String>> {
    parts.into_iter().map(|p| Ok(p.to_string())).collect()
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn generate_stream(&self, prompt: &str) -> Result<FragmentStream> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Reply::Fragments(vec!["ok"]));

        use futures::StreamExt;
        let stream: FragmentStream = match reply {
            Reply::Fragments(parts) => Box::pin(stream::iter(fragments(parts))),
            Reply::FailToStart => {
                return Err(RagError::Backend("model not loaded".to_string()))
            }
            Reply::FailMidStream(parts) => Box::pin(stream::iter(fragments(parts)).chain(
                stream::iter(vec![Err(RagError::Backend("stream reset".to_string()))]),
            )),
            Reply::CancelMidStream(parts, token) => {
                let tail = stream::once(async move {
                    token.cancel();
                    futures::future::pending::<Result<String>>().await
                });
                Box::pin(
                    stream::iter(fragments(parts))
                        .chain(tail)
                        .chain(stream::iter(fragments(vec!["never shown"]))),
                )
            }
        };
        Ok(stream)
    }
}

struct Harness {
    embedder: Arc<HashEmbedder>,
    generator: Arc<ScriptedGenerator>,
    cancel: CancellationToken,
    session: Session,
}

fn chunk(id: &str, text: &str) -> Chunk {
    Chunk {
        id: id.to_string(),
        source_path: "dati/notes.txt".to_string(),
        unit_index: 0,
        chunk_index: 0,
        text: text.to_string(),
        start_offset: 0,
        length: text.chars().count(),
    }
}

fn harness(replies: Vec<Reply>, cancel: CancellationToken) -> Harness {
    let store = InMemoryStore::new();
    for (id, text) in [
        ("a", "Nmap scans ports with SYN packets."),
        ("b", "Terraform plans infrastructure changes."),
    ] {
        store.insert(chunk(id, text), embed_text(text));
    }

    let embedder = Arc::new(HashEmbedder::new());
    let index = VectorIndex::new(Arc::new(store), embedder.clone());
    let generator = Arc::new(ScriptedGenerator::with_replies(replies));
    let session = Session::new(
        Retriever::new(Arc::new(index), 5),
        PromptAssembler::default(),
        generator.clone(),
        &SessionConfig::default(),
        cancel.clone(),
    );

    Harness {
        embedder,
        generator,
        cancel,
        session,
    }
}

async fn run(h: &Harness, input: &str) -> (SessionEnd, String) {
    let mut output = Vec::new();
    let end = h
        .session
        .run(BufReader::new(input.as_bytes()), &mut output)
        .await
        .unwrap();
    (end, String::from_utf8(output).unwrap())
}

#[tokio::test]
async fn test_blank_lines_and_exit_make_no_backend_calls() {
    let h = harness(vec![], CancellationToken::new());
    let (end, output) = run(&h, "\n   \n ESCI \nnever read\n").await;

    assert_eq!(end, SessionEnd::Exited);
    assert_eq!(h.embedder.calls(), 0);
    assert!(h.generator.prompts().is_empty());
    assert_eq!(output.matches(QUESTION_PROMPT).count(), 3);
    assert!(!output.contains(ANSWER_PREFIX));
}

#[tokio::test]
async fn test_query_makes_one_retrieval_and_one_generation() {
    let h = harness(vec![], CancellationToken::new());
    let (end, _) = run(&h, "how does nmap scan?\nesci\n").await;

    assert_eq!(end, SessionEnd::Exited);
    assert_eq!(h.embedder.calls(), 1);
    assert_eq!(h.generator.prompts().len(), 1);
}

#[tokio::test]
async fn test_fragments_streamed_in_order() {
    let h = harness(
        vec![Reply::Fragments(vec!["Usa ", "`nmap -sS`", " per", " la scansione."])],
        CancellationToken::new(),
    );
    let (_, output) = run(&h, "come scansiono le porte?\nesci\n").await;

    let expected = format!("{}Usa `nmap -sS` per la scansione.\n", ANSWER_PREFIX);
    assert!(output.contains(&expected), "output was: {:?}", output);
}

#[tokio::test]
async fn test_prompt_carries_context_and_question() {
    let h = harness(vec![], CancellationToken::new());
    run(&h, "nmap SYN ports\nesci\n").await;

    let prompts = h.generator.prompts();
    let prompt = &prompts[0];
    let nmap = prompt.find("Nmap scans ports with SYN packets.").unwrap();
    let terraform = prompt.find("Terraform plans infrastructure changes.").unwrap();
    assert!(nmap < terraform, "best chunk must come first");
    assert!(prompt.contains("Domanda: nmap SYN ports"));
}

#[tokio::test]
async fn test_end_of_input_terminates() {
    let h = harness(vec![], CancellationToken::new());
    let (end, _) = run(&h, "first question\n").await;

    assert_eq!(end, SessionEnd::EndOfInput);
    assert_eq!(h.generator.prompts().len(), 1);
}

#[tokio::test]
async fn test_backend_error_reported_and_loop_continues() {
    let h = harness(
        vec![Reply::FailToStart, Reply::Fragments(vec!["second answer"])],
        CancellationToken::new(),
    );
    let (end, output) = run(&h, "q1\nq2\nesci\n").await;

    assert_eq!(end, SessionEnd::Exited);
    assert!(output.contains("Errore"));
    assert!(output.contains("model not loaded"));
    assert!(output.contains("second answer"));
    assert_eq!(h.generator.prompts().len(), 2);
}

#[tokio::test]
async fn test_mid_stream_error_keeps_partial_answer() {
    let h = harness(
        vec![Reply::FailMidStream(vec!["partial "])],
        CancellationToken::new(),
    );
    let (end, output) = run(&h, "q\nesci\n").await;

    assert_eq!(end, SessionEnd::Exited);
    let partial = output.find("partial ").unwrap();
    let error = output.find("stream reset").unwrap();
    assert!(partial < error);
}

#[tokio::test]
async fn test_cancel_mid_stream_stops_output() {
    let cancel = CancellationToken::new();
    let h = harness(
        vec![Reply::CancelMidStream(vec!["first "], cancel.clone())],
        cancel,
    );
    let (end, output) = run(&h, "q\nanother question\n").await;

    assert_eq!(end, SessionEnd::Cancelled);
    assert!(output.contains("first "));
    assert!(!output.contains("never shown"));
    assert!(output.ends_with(&format!("{}\n", EXIT_NOTICE)));
    assert_eq!(h.generator.prompts().len(), 1);
}

#[tokio::test]
async fn test_cancel_before_input() {
    let h = harness(vec![], CancellationToken::new());
    h.cancel.cancel();
    let (end, output) = run(&h, "a question\n").await;

    assert_eq!(end, SessionEnd::Cancelled);
    assert_eq!(h.embedder.calls(), 0);
    assert!(output.contains(EXIT_NOTICE));
}

#[tokio::test]
async fn test_cat_corpus_end_to_end() {
    let tmp = TempDir::new().unwrap();
    write_corpus(tmp.path(), &[("cat.txt", "Cats are mammals. Cats purr.")]);
    let config = test_config(tmp.path());

    let embedder = Arc::new(HashEmbedder::new());
    let index = VectorIndex::open_or_build(&config, embedder.clone())
        .await
        .unwrap();
    let index = Arc::new(index);

    let top = index.search("What sound do cats make?", 1).await.unwrap();
    assert_eq!(top[0].chunk.text, "Cats are mammals. Cats purr.");

    let generator = Arc::new(ScriptedGenerator::with_replies(vec![Reply::Fragments(
        vec!["Cats ", "purr."],
    )]));
    let session = Session::new(
        Retriever::new(index, config.retrieval.k),
        PromptAssembler::new(&config.prompt),
        generator.clone(),
        &config.session,
        CancellationToken::new(),
    );

    let mut output = Vec::new();
    let end = session
        .run(
            BufReader::new("What sound do cats make?\nesci\n".as_bytes()),
            &mut output,
        )
        .await
        .unwrap();
    assert_eq!(end, SessionEnd::Exited);

    let prompts = generator.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Cats are mammals. Cats purr."));
    assert!(prompts[0].contains("What sound do cats make?"));

    let output = String::from_utf8(output).unwrap();
    assert!(output.contains("Risposta: Cats purr.\n"));
}
