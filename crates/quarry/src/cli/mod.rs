// crates/quarry/src/cli/mod.rs
// CLI module for Quarry commands

use crate::config::{EnvConfig, Overrides, QuarryConfig, Settings};
use crate::engine::Engine;
use crate::llm::{OpenAiCompatClient, Sampling};
use crate::reasoning::LlmReasoner;
use crate::retrieval::TfidfRetriever;
use crate::store::SqliteStore;
use crate::trace::{JsonlTraceSink, NullTraceSink, TraceSink};
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub mod ask;
pub mod inspect;
pub mod run;

pub use ask::run_ask;
pub use inspect::{run_check, run_schema, run_search};
pub use run::run_batch;

#[derive(Parser)]
#[command(name = "quarry")]
#[command(about = "Answer questions over documents and a SQLite database")]
#[command(version)]
pub struct Cli {
    /// Config file (default: ~/.quarry/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Data sources and model endpoint, overriding env and config file
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// SQLite database
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Directory of markdown documents
    #[arg(long)]
    pub docs: Option<PathBuf>,

    /// Model name
    #[arg(long)]
    pub model: Option<String>,

    /// OpenAI-compatible endpoint base URL
    #[arg(long)]
    pub api_base: Option<String>,

    /// API key for hosted endpoints
    #[arg(long)]
    pub api_key: Option<String>,

    /// JSONL trace file
    #[arg(long)]
    pub trace: Option<PathBuf>,

    /// Disable the JSONL trace
    #[arg(long, conflicts_with = "trace")]
    pub no_trace: bool,
}

impl SourceArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            model: self.model.clone(),
            base_url: self.api_base.clone(),
            api_key: self.api_key.clone(),
            db: self.db.clone(),
            docs: self.docs.clone(),
            trace: self.trace.clone(),
            no_trace: self.no_trace,
            top_k: None,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Answer every question in a JSONL batch file
    Run {
        /// Input JSONL: {"id", "question", "format_hint"} per line
        #[arg(long)]
        batch: PathBuf,

        /// Output JSONL, one answer record per question
        #[arg(long)]
        out: PathBuf,

        #[command(flatten)]
        sources: SourceArgs,

        /// Persist each finished run state here
        #[arg(long)]
        checkpoint_dir: Option<PathBuf>,

        /// Reuse checkpoints instead of re-running answered questions
        #[arg(long, requires = "checkpoint_dir")]
        resume: bool,
    },

    /// Answer a single question and print its record
    Ask {
        question: String,

        /// Answer shape: int, float, str, list[...], {...}
        #[arg(short, long, default_value = "str")]
        format: String,

        #[command(flatten)]
        sources: SourceArgs,
    },

    /// Show which document fragments a query retrieves
    Search {
        query: String,

        /// Number of fragments (default: retrieval.top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        #[command(flatten)]
        sources: SourceArgs,
    },

    /// Print the schema as the query generator sees it
    Schema {
        #[command(flatten)]
        sources: SourceArgs,
    },

    /// Validate the resolved configuration
    Check {
        #[command(flatten)]
        sources: SourceArgs,
    },
}

/// Resolve settings: CLI flags > env > config file > defaults
pub fn load_settings(config: Option<&Path>, overrides: &Overrides) -> Settings {
    let file = match config {
        Some(path) => QuarryConfig::load_from(path),
        None => QuarryConfig::load(),
    };
    Settings::resolve(overrides, &EnvConfig::load(), &file)
}

/// Wire the production collaborators into an engine
pub fn build_engine(settings: &Settings) -> Result<Engine> {
    let client = OpenAiCompatClient::new(
        &settings.base_url,
        settings.model.clone(),
        settings.api_key.clone(),
    )
    .with_sampling(Sampling {
        temperature: settings.temperature,
        top_p: settings.top_p,
        max_tokens: settings.max_tokens,
    });
    let reasoner = Arc::new(LlmReasoner::new(Arc::new(client)));
    let retriever = Arc::new(TfidfRetriever::open(&settings.docs_path, settings.chunk_size)?);
    let store = Arc::new(SqliteStore::open(&settings.db_path)?);

    let trace: Arc<dyn TraceSink> = match &settings.trace_path {
        Some(path) => {
            info!(path = %path.display(), "Tracing pipeline stages");
            Arc::new(JsonlTraceSink::new(path))
        }
        None => Arc::new(NullTraceSink),
    };

    info!(
        model = %settings.model,
        base_url = %settings.base_url,
        fragments = retriever.len(),
        db = %settings.db_path.display(),
        "Engine ready"
    );

    Ok(Engine::new(reasoner, retriever, store)
        .with_trace(trace)
        .with_top_k(settings.top_k))
}

/// Execute a parsed command line
pub async fn dispatch(cli: Cli) -> Result<()> {
    let config = cli.config.as_deref();
    match cli.command {
        Commands::Run {
            batch,
            out,
            sources,
            checkpoint_dir,
            resume,
        } => {
            let settings = load_settings(config, &sources.overrides());
            run_batch(&settings, &batch, &out, checkpoint_dir, resume).await
        }
        Commands::Ask {
            question,
            format,
            sources,
        } => {
            let settings = load_settings(config, &sources.overrides());
            run_ask(&settings, &question, &format).await
        }
        Commands::Search {
            query,
            top_k,
            sources,
        } => {
            let mut overrides = sources.overrides();
            overrides.top_k = top_k;
            let settings = load_settings(config, &overrides);
            run_search(&settings, &query)
        }
        Commands::Schema { sources } => {
            let settings = load_settings(config, &sources.overrides());
            run_schema(&settings).await
        }
        Commands::Check { sources } => {
            let settings = load_settings(config, &sources.overrides());
            run_check(&settings)
        }
    }
}
