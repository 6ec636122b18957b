//! # Policy assistant CLI (`polrag`)
//!
//! ## Usage
//!
//! ```bash
//! polrag --config ./config/polrag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `polrag init` | Create the SQLite database and run schema migrations |
//! | `polrag ingest [FILES...]` | Index PDFs (default: the configured documents directory) |
//! | `polrag ask "<question>"` | Answer a question from the indexed documents |
//! | `polrag stats` | Show the number of indexed chunks |
//! | `polrag clear` | Delete every indexed chunk |
//! | `polrag serve` | Start the HTTP API |

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use policy_rag::answer::format_response;
use policy_rag::config;
use policy_rag::ingest::{IngestReport, Ingestor};
use policy_rag::migrate;
use policy_rag::server;
use policy_rag::store::{SqliteIndex, VectorIndex};
use policy_rag::PolicyAssistant;

/// Grounded question answering over policy PDFs.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/polrag.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "polrag",
    about = "Ask questions about your policy documents and get cited, grounded answers",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/polrag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Index PDF documents.
    ///
    /// With no FILES, every PDF under `[ingest].documents_dir` is indexed.
    /// A file that fails is reported and the rest continue.
    Ingest {
        /// PDF files to index.
        files: Vec<PathBuf>,

        /// Clear the index before ingesting.
        #[arg(long)]
        clear: bool,
    },

    /// Answer a question from the indexed documents.
    Ask {
        question: String,

        /// Print the response as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show index statistics.
    Stats,

    /// Delete every indexed chunk. Cannot be undone.
    Clear,

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_report(report: &IngestReport) {
    println!("ingest");
    for file in &report.files {
        match &file.error {
            None => println!(
                "  {}: {} pages, {} chunks",
                file.filename, file.pages, file.chunks_indexed
            ),
            Some(error) => println!("  {}: FAILED ({})", file.filename, error),
        }
    }
    println!("  chunks added: {}", report.chunks_added());
    println!("  files failed: {}", report.failed());
    println!(
        "  collection {}: {} chunks total",
        report.collection_name, report.total_chunks_indexed
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { files, clear } => {
            let ingestor = Ingestor::from_config(&cfg).await?;
            let report = if files.is_empty() {
                let dir = &cfg.ingest.documents_dir;
                ingestor
                    .ingest_directory(dir, clear)
                    .await
                    .with_context(|| format!("ingesting {}", dir.display()))?
            } else {
                ingestor.ingest_files(&files, clear).await?
            };
            print_report(&report);
        }
        Commands::Ask { question, json } => {
            let assistant = PolicyAssistant::from_config(&cfg).await?;
            let response = assistant.ask(&question).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!("{}", format_response(&response));
            }
        }
        Commands::Stats => {
            let index = SqliteIndex::open(&cfg).await?;
            let stats = index.stats().await?;
            println!("Collection: {}", stats.collection_name);
            println!("Total chunks: {}", stats.total_chunks);
        }
        Commands::Clear => {
            let index = SqliteIndex::open(&cfg).await?;
            index.clear().await?;
            println!("Index cleared.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
