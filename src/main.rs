//! # Sitter CLI (`sitter`)
//!
//! The `sitter` binary runs the support desk API or performs one-shot
//! support tasks against local documents.
//!
//! ## Usage
//!
//! ```bash
//! sitter --config ./config/sitter.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sitter serve` | Start the JSON HTTP API |
//! | `sitter ingest <paths..>` | Show what a knowledge-base import would contain |
//! | `sitter ask --country C QUESTION` | Ask the support agent |
//! | `sitter stakeholders` | Extract stakeholders from documents |
//! | `sitter sources` | List configured RAG sources |
//!
//! ## Examples
//!
//! ```bash
//! # Preview an import
//! sitter ingest ./docs/acme
//!
//! # Bilingual answer grounded in local files
//! sitter ask --country Taiwan --kb ./docs/acme "How do I reindex the catalog?"
//!
//! # Stakeholder table as CSV
//! sitter stakeholders --kb ./docs/acme --csv > stakeholders.csv
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use sitter::config::{self, Config};
use sitter::connector_fs::select_paths;
use sitter::dashboard::Dashboard;
use sitter::ids::UuidIds;
use sitter::ingest::ingest_selection;
use sitter::models::{AgentResult, KnowledgeBaseEntry, Stakeholder};
use sitter::progress::{format_number, IngestProgressReporter, ProgressMode};
use sitter::{server, sources};

/// Sitter: a bilingual technical support desk backed by a generative model.
///
/// Configuration is read from `--config`, or `./config/sitter.toml` when it
/// exists. See `config/sitter.example.toml` for every setting.
#[derive(Parser)]
#[command(
    name = "sitter",
    about = "Sitter: a bilingual technical support desk backed by a generative model",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Show debug logs on stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the JSON HTTP API.
    ///
    /// Binds to `[server].bind`. The knowledge base, RAG source flags and
    /// stakeholders live in memory for the life of the process.
    Serve,

    /// Preview a knowledge-base import without contacting the model.
    ///
    /// Selects the given files and folders, applies the admission filter
    /// and prints the resulting entry name and file table.
    Ingest {
        /// Files or folders to import as one entry.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Emit progress as JSON lines on stderr.
        #[arg(long)]
        json_progress: bool,
    },

    /// Ask the support agent a question.
    Ask {
        /// Client country the answer should be tailored to.
        #[arg(long)]
        country: String,

        /// File or folder to attach as a knowledge-base entry. Repeatable.
        #[arg(long = "kb")]
        knowledge_base: Vec<PathBuf>,

        /// Print the raw JSON result.
        #[arg(long)]
        json: bool,

        /// The support question.
        question: String,
    },

    /// Extract stakeholders from knowledge-base documents.
    Stakeholders {
        /// File or folder to attach as a knowledge-base entry. Repeatable.
        #[arg(long = "kb")]
        knowledge_base: Vec<PathBuf>,

        /// Print CSV instead of a table.
        #[arg(long)]
        csv: bool,
    },

    /// List configured RAG sources.
    Sources,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sitter={}", log_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cfg = config::resolve_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Ingest {
            paths,
            json_progress,
        } => {
            let mode = if json_progress {
                ProgressMode::Json
            } else {
                ProgressMode::default_for_tty()
            };
            preview_ingest(&cfg, &paths, mode.reporter().as_ref()).await?;
        }
        Commands::Ask {
            country,
            knowledge_base,
            json,
            question,
        } => {
            let dashboard = load_dashboard(cfg, &knowledge_base).await?;
            let result = dashboard.ask(&country, &question).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_answer(&result);
            }
        }
        Commands::Stakeholders {
            knowledge_base,
            csv,
        } => {
            let dashboard = load_dashboard(cfg, &knowledge_base).await?;
            let found = dashboard.generate_stakeholders().await?;
            if csv {
                print!("{}", dashboard.export_csv().await);
            } else {
                print_stakeholders(&found);
            }
        }
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
    }

    Ok(())
}

/// Build a Gemini-backed dashboard with one entry per `--kb` path.
async fn load_dashboard(cfg: Config, knowledge_base: &[PathBuf]) -> anyhow::Result<Dashboard> {
    let dashboard = Dashboard::from_config(cfg)?;
    let progress = ProgressMode::default_for_tty().reporter();
    for path in knowledge_base {
        dashboard
            .ingest_paths_with(std::slice::from_ref(path), progress.as_ref())
            .await
            .with_context(|| format!("Failed to ingest {}", path.display()))?;
    }
    Ok(dashboard)
}

async fn preview_ingest(
    cfg: &Config,
    paths: &[PathBuf],
    progress: &dyn IngestProgressReporter,
) -> anyhow::Result<()> {
    let selection = select_paths(paths, &cfg.ingest)?;
    let selected = selection.files.len();
    let entry = ingest_selection(selection, &cfg.ingest, &UuidIds, progress).await?;
    print_entry(&entry, selected);
    Ok(())
}

fn print_entry(entry: &KnowledgeBaseEntry, selected: usize) {
    println!("Entry:    {}", entry.name);
    println!("Source:   {}", entry.source_path);
    println!(
        "Admitted: {} of {} selected files",
        format_number(entry.files.len() as u64),
        format_number(selected as u64)
    );
    println!();
    println!("{:<40} {:<32} {:>8}", "PATH", "TYPE", "SIZE");
    for file in &entry.files {
        println!(
            "{:<40} {:<32} {:>6} KB",
            file.relative_path,
            file.mime_type,
            file.size_bytes() / 1024
        );
    }
}

fn print_answer(result: &AgentResult) {
    println!("── English ──");
    println!("{}", result.answer_english);
    println!();
    println!("── 中文 ──");
    println!("{}", result.answer_chinese);
    if !result.grounding_urls.is_empty() {
        println!();
        println!("Sources:");
        for url in &result.grounding_urls {
            println!("  {} <{}>", url.title, url.uri);
        }
    }
}

fn print_stakeholders(stakeholders: &[Stakeholder]) {
    if stakeholders.is_empty() {
        println!("No stakeholders found.");
        return;
    }
    println!("{:<24} {:<12} {:<28} {:<28} SOURCE", "NAME", "REGION", "DEPARTMENT", "ROLE");
    for s in stakeholders {
        println!(
            "{:<24} {:<12} {:<28} {:<28} {}",
            s.name, s.region, s.department, s.role, s.source
        );
    }
}
