//! # easy-rag CLI
//!
//! ```bash
//! # Build the index of the "networks" knowledge base from <raw_dir>/networks
//! easy-rag ingest --kb networks
//!
//! # Ask a question against it
//! easy-rag ask --kb networks --top-k 4 "Why does TCP need a three-way handshake?"
//!
//! # Knowledge bases and whether they are indexed
//! easy-rag list
//! ```
//!
//! Logs go to stderr (`RUST_LOG` controls the level); results go to stdout.

use anyhow::Result;
use clap::{Parser, Subcommand};
use easy_rag::paths::PlatformPaths;
use easy_rag::{AskRequest, Config, ErrorClass, IngestRequest, RagClient, RagError};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_COMMIT_HASH"),
    ", built ",
    env!("BUILD_TIMESTAMP"),
    ")"
);

/// Retrieval-augmented question answering over course material
#[derive(Parser)]
#[command(name = "easy-rag", version, long_version = LONG_VERSION)]
struct Cli {
    /// Configuration file (TOML). Defaults to the platform config directory.
    #[arg(long, global = true, env = "EASY_RAG_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index of a knowledge base from its raw documents
    Ingest {
        /// Knowledge base name
        #[arg(long)]
        kb: String,

        /// Keep the previously published index generation on disk
        #[arg(long)]
        no_rebuild: bool,
    },

    /// Answer a question from a knowledge base
    Ask {
        /// Knowledge base name
        #[arg(long)]
        kb: String,

        /// Number of passages to retrieve
        #[arg(long)]
        top_k: Option<usize>,

        /// The question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// List knowledge bases
    List,

    /// Print the effective configuration (API keys redacted)
    Config {
        /// Also write it to the config file (`--config`, else the default location)
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            match err.downcast_ref::<RagError>().map(RagError::class) {
                Some(ErrorClass::ClientInput) => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::with_file(path)?,
        None => Config::new()?,
    };

    match cli.command {
        Commands::Ingest { kb, no_rebuild } => {
            let client = RagClient::with_config(config)?;
            let response = client
                .ingest(IngestRequest {
                    namespace: kb,
                    rebuild: !no_rebuild,
                })
                .await?;
            println!(
                "Indexed '{}': {} documents, {} chunks in {} ms",
                response.namespace, response.documents, response.chunks, response.duration_ms
            );
            println!("Index: {}", response.index_dir.display());
        }
        Commands::Ask {
            kb,
            top_k,
            question,
        } => {
            let client = RagClient::with_config(config)?;
            let response = client
                .ask(AskRequest {
                    namespace: kb,
                    question: question.join(" "),
                    top_k,
                })
                .await?;
            println!("{}\n", response.answer);
            for (i, context) in response.contexts.iter().enumerate() {
                let page = context.page.as_deref().unwrap_or("-");
                println!("[{}] {} (p. {})", i + 1, context.source, page);
            }
            println!("\n({} ms)", response.latency_ms);
        }
        Commands::List => {
            let client = RagClient::with_config(config)?;
            let namespaces = client.list_namespaces().await?;
            if namespaces.is_empty() {
                println!(
                    "No knowledge bases under {}",
                    client.config().storage.raw_dir.display()
                );
            }
            for ns in namespaces {
                let status = if ns.indexed { "indexed" } else { "not indexed" };
                println!("{:<24} {:>5} files  {}", ns.name, ns.files, status);
            }
        }
        Commands::Config { save } => {
            print!("{}", toml::to_string_pretty(&config)?);
            let key_state = |empty: bool| if empty { "unset" } else { "set" };
            println!("\n# embedding api key: {}", key_state(config.embedding.api_key.is_empty()));
            println!("# generation api key: {}", key_state(config.generation.api_key.is_empty()));
            if save {
                let path = cli
                    .config
                    .clone()
                    .unwrap_or_else(PlatformPaths::default_config_path);
                config.save(&path)?;
                println!("# saved to {}", path.display());
            }
        }
    }

    Ok(())
}
