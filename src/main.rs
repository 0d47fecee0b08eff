//! # corpus-rag CLI (`rag`)
//!
//! Starts an interactive question session over the documents in the corpus
//! folder, building the vector index first if there is none yet.
//!
//! ## Usage
//!
//! ```bash
//! rag [--config ./config/rag.toml] [--data-dir dati] [--persist-dir vector_db]
//!     [--model mistral] [--ollama-url http://localhost:11434]
//! ```
//!
//! Type `esci` (or send end-of-file) to leave; Ctrl-C interrupts at any
//! point. Logs go to stderr and are filtered with `RUST_LOG` (default
//! `info`).

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use corpus_rag::config::{self, Config};
use corpus_rag::embedding::OllamaEmbedder;
use corpus_rag::error::RagError;
use corpus_rag::generation::OllamaGenerator;
use corpus_rag::index::VectorIndex;
use corpus_rag::prompt::PromptAssembler;
use corpus_rag::retriever::Retriever;
use corpus_rag::session::{Session, EXIT_NOTICE};

/// Ask questions about a local folder of PDF and text documents.
#[derive(Parser)]
#[command(name = "rag", version, about)]
struct Cli {
    /// Path to a configuration file (TOML). Built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Folder holding the .pdf / .txt documents.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Folder holding the persisted vector index.
    #[arg(long)]
    persist_dir: Option<PathBuf>,

    /// Ollama model used for generation (and embeddings, unless configured).
    #[arg(long, env = "RAG_MODEL")]
    model: Option<String>,

    /// Base URL of the Ollama server.
    #[arg(long, env = "OLLAMA_URL")]
    ollama_url: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(cli));
    // Reading stdin parks a blocking thread that never returns on its own.
    runtime.shutdown_timeout(Duration::from_millis(100));

    result
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn resolve_config(cli: &Cli) -> Result<Config, RagError> {
    let mut cfg = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => Config::default(),
    };

    if let Some(dir) = &cli.data_dir {
        cfg.paths.data_dir = dir.clone();
    }
    if let Some(dir) = &cli.persist_dir {
        cfg.paths.persist_dir = dir.clone();
    }
    if let Some(model) = &cli.model {
        cfg.model.name = model.clone();
    }
    if let Some(url) = &cli.ollama_url {
        cfg.model.url = url.clone();
    }

    cfg.validate()?;
    Ok(cfg)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = resolve_config(&cli)?;

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let embedder = Arc::new(OllamaEmbedder::new(&cfg.model));
    let opened = VectorIndex::open_or_build_cancellable(&cfg, embedder, &cancel).await;
    let index = match opened {
        Ok(index) => index,
        Err(RagError::UserAbort) => {
            println!("{}", EXIT_NOTICE);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let session = Session::new(
        Retriever::new(Arc::new(index), cfg.retrieval.k),
        PromptAssembler::new(&cfg.prompt),
        Arc::new(OllamaGenerator::new(&cfg.model)),
        &cfg.session,
        cancel,
    );

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let end = session.run(stdin, &mut stdout).await?;
    info!(?end, "session closed");

    ctrl_c.abort();
    Ok(())
}
