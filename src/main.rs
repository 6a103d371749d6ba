//! # Scholar CLI (`scholar`)
//!
//! Answers questions about a corpus of lecture transcripts, notes, and posts
//! by retrieving the most relevant documents and handing them to a language
//! model.
//!
//! ## Usage
//!
//! ```bash
//! scholar --config ./config/scholar.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `scholar build` | Load documents, embed them, and write the corpus snapshot |
//! | `scholar ask "<question>"` | Answer one question with sources |
//! | `scholar chat` | Interactive question loop on stdin |
//! | `scholar search "<query>"` | Show ranked documents and scores |
//! | `scholar stats` | Summarize the snapshot on disk |
//! | `scholar serve` | Start the HTTP front door |
//!
//! Logs go to stderr and are controlled by `RUST_LOG`
//! (default `scholar_rag=info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use scholar_rag::progress::ProgressMode;
use scholar_rag::{ask, config, engine::RagEngine, ingest, search, server, stats};

/// Scholar: retrieval-augmented answers over your own lecture material.
#[derive(Parser)]
#[command(
    name = "scholar",
    about = "Scholar: retrieval-augmented question answering over a local corpus",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/scholar.toml")]
    config: PathBuf,

    /// Build progress output. Defaults to `human` on a terminal, `off` otherwise.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load documents, chunk and embed them, and write the corpus snapshot.
    ///
    /// Unchanged chunks reuse their vectors from the previous snapshot.
    Build {
        /// Re-embed every chunk, ignoring the previous snapshot.
        #[arg(long)]
        force: bool,
    },

    /// Answer a single question.
    Ask {
        /// The question to answer.
        question: String,

        /// Number of documents to retrieve (defaults to `[retrieval].top_k`).
        #[arg(long)]
        top_k: Option<usize>,

        /// Print the prompt sent to the generator.
        #[arg(long)]
        show_prompt: bool,
    },

    /// Interactive question loop. Type `exit` to quit.
    Chat,

    /// Rank documents for a query and print their scores.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results to return.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Show snapshot statistics.
    Stats,

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "scholar_rag=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let progress = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);

    match cli.command {
        Commands::Build { force } => {
            ingest::run_build(cfg, force, progress).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg)?;
        }
        Commands::Ask {
            question,
            top_k,
            show_prompt,
        } => {
            let engine = open_engine(cfg, progress).await?;
            ask::run_ask(&engine, &question, top_k, show_prompt).await?;
        }
        Commands::Chat => {
            let engine = open_engine(cfg, progress).await?;
            ask::run_chat(&engine).await?;
        }
        Commands::Search { query, top_k } => {
            let engine = open_engine(cfg, progress).await?;
            search::run_search(&engine, &query, top_k).await?;
        }
        Commands::Serve => {
            let bind = cfg.server.bind.clone();
            let engine = open_engine(cfg, progress).await?;
            server::run_server(Arc::new(engine), &bind).await?;
        }
    }

    Ok(())
}

/// Load the snapshot, building it first if none exists.
async fn open_engine(cfg: config::Config, progress: ProgressMode) -> anyhow::Result<RagEngine> {
    let reporter = progress.reporter();
    RagEngine::open(cfg, reporter.as_ref()).await
}
