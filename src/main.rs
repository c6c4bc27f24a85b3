//! # paperqa CLI (`pqa`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pqa init` | Create the index database |
//! | `pqa fetch "<query>"` | Download recent arXiv papers |
//! | `pqa ingest <pdf>` | Extract and segment one paper |
//! | `pqa index <pdf>...` | Build the vector index from papers |
//! | `pqa ask "<question>"` | Answer a question from the index |
//! | `pqa prompt <persona>` | Print a persona's prompt template |
//!
//! ## Examples
//!
//! ```bash
//! pqa --config ./config/pqa.toml init
//! pqa fetch "graph neural networks" --max 2
//! pqa ingest data/papers/paper.pdf --json
//! pqa ask "What were the results?" --persona professor --pdf data/papers/paper.pdf
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use paperqa::config::{self, Config};
use paperqa::core::prompt::{build_prompt, Persona};
use paperqa::core::PipelineError;
use paperqa::migrate;
use paperqa::pipeline::{IngestStatus, IngestedPaper, Pipeline};

/// paperqa: ask questions about research papers.
#[derive(Parser)]
#[command(name = "pqa", version, about = "Question answering over research papers")]
struct Cli {
    /// Path to configuration file (TOML). Defaults are used when the
    /// file does not exist.
    #[arg(long, global = true, default_value = "./config/pqa.toml")]
    config: PathBuf,

    /// Log at debug level (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the index database. Safe to run repeatedly.
    Init,

    /// Search arXiv and download the most recent matching papers.
    Fetch {
        /// Free-text query. Empty means "LLM".
        #[arg(default_value = "")]
        query: String,

        /// Number of papers to download (1-10).
        #[arg(long)]
        max: Option<usize>,
    },

    /// Extract and segment one PDF.
    Ingest {
        path: PathBuf,

        /// Print the paper record as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Ingest PDFs and build the vector index from their sections.
    Index {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Collection name (defaults to `[index].collection`).
        #[arg(long)]
        collection: Option<String>,
    },

    /// Answer a question from the index.
    Ask {
        question: String,

        /// default, student, or professor.
        #[arg(long, default_value = "default")]
        persona: String,

        /// Rebuild the collection from these PDFs before answering.
        #[arg(long = "pdf")]
        pdfs: Vec<PathBuf>,

        #[arg(long)]
        collection: Option<String>,

        /// Print the rendered prompt instead of calling the model.
        #[arg(long)]
        show_prompt: bool,
    },

    /// Print a persona's prompt template.
    Prompt {
        #[arg(default_value = "default")]
        persona: String,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::minimal())
    }
}

fn print_paper(paper: &IngestedPaper) {
    println!("Title: {}", paper.title);
    println!("Extraction: {}", paper.extraction_method);
    match paper.status {
        IngestStatus::Ok => {
            println!("Sections: {}", paper.sections.len());
            for section in &paper.sections {
                println!(
                    "  {} ({} chars)",
                    section.title,
                    section.content.chars().count()
                );
            }
        }
        other => println!("Status: {}", other),
    }
}

fn ingest_all(pipeline: &Pipeline, paths: &[PathBuf]) -> Vec<IngestedPaper> {
    paths
        .iter()
        .map(|path| {
            let paper = pipeline.ingest(path);
            if paper.status != IngestStatus::Ok {
                eprintln!("{}: {}", paper.title, paper.status);
            }
            paper
        })
        .collect()
}

fn explain(err: PipelineError) -> anyhow::Error {
    match err {
        PipelineError::EmptyIndex => anyhow::anyhow!(
            "nothing to index: no section had more than the minimum number of characters"
        ),
        PipelineError::ModelMismatch { index, query } => anyhow::anyhow!(
            "the index was built with embedding model '{}' but '{}' is configured; \
             rebuild it with `pqa index` or pass --pdf",
            index,
            query
        ),
        other => other.into(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Commands::Prompt { persona } = &cli.command {
        let template = build_prompt(persona);
        if Persona::parse(persona).as_str() != persona.trim().to_ascii_lowercase() {
            eprintln!("Unknown persona '{}', using default.", persona);
        }
        print!("{}", template.template);
        return Ok(());
    }

    let cfg = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Index initialized at {}", cfg.index.db_path().display());
        }
        Commands::Fetch { query, max } => {
            let fetcher = paperqa::fetch::ArxivFetcher::new(&cfg.fetch)?;
            let paths = fetcher
                .fetch(&query, max.unwrap_or(cfg.fetch.max_results))
                .await;
            if paths.is_empty() {
                println!("No papers found.");
            }
            for path in paths {
                println!("{}", path.display());
            }
        }
        Commands::Ingest { path, json } => {
            if !path.exists() {
                bail!("File not found: {}", path.display());
            }
            let paper = paperqa::pipeline::ingest(&path);
            if json {
                println!("{}", serde_json::to_string_pretty(&paper)?);
            } else {
                print_paper(&paper);
            }
        }
        Commands::Index { paths, collection } => {
            let pipeline = Pipeline::open(cfg).await?;
            let collection =
                collection.unwrap_or_else(|| pipeline.config().index.collection.clone());
            let papers = ingest_all(&pipeline, &paths);
            let handle = pipeline
                .index(&papers, &collection)
                .await
                .map_err(explain)?;
            println!(
                "Indexed {} units from {} paper(s) into '{}' ({}, {} dims)",
                handle.unit_count,
                papers.len(),
                handle.collection,
                handle.model,
                handle.dims
            );
        }
        Commands::Ask {
            question,
            persona,
            pdfs,
            collection,
            show_prompt,
        } => {
            let pipeline = Pipeline::open(cfg).await?;
            let collection =
                collection.unwrap_or_else(|| pipeline.config().index.collection.clone());
            let handle = if pdfs.is_empty() {
                pipeline.load_index(&collection).await?
            } else {
                let papers = ingest_all(&pipeline, &pdfs);
                pipeline
                    .index(&papers, &collection)
                    .await
                    .map_err(explain)?
            };

            if show_prompt {
                let prompt = pipeline
                    .render_prompt(&handle, &question, &persona)
                    .await
                    .map_err(explain)?;
                print!("{}", prompt.text);
                return Ok(());
            }

            let answer = pipeline
                .ask(&handle, &question, &persona)
                .await
                .map_err(explain)?;
            println!("{}", answer.text.trim_end());
            if !answer.sources.is_empty() {
                println!();
                println!("Sources:");
                for source in &answer.sources {
                    println!("  - {} / {}", source.source, source.section);
                }
            }
        }
        Commands::Prompt { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
