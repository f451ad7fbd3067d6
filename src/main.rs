//! # threatload CLI
//!
//! ```bash
//! threatload --config ./config/threatload.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `threatload init` | Create the document and status collections, register the pipeline |
//! | `threatload load` | Read the CSV, enrich, bulk load in batches, record status |
//! | `threatload status` | Print the completion flag of the last load |
//! | `threatload enrich "<text>"` | Print the enrichment of a text locally |
//!
//! Logging goes to stderr and is filtered with `RUST_LOG`
//! (default `threatload=info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use threatload::config::{self, EnrichmentMode};
use threatload::enrich_cmd;
use threatload::load::{self, LoadOptions};
use threatload::progress::ProgressMode;
use threatload::status;

/// threatload: bulk-load labeled text into a search index with sentiment
/// and weapon enrichment.
#[derive(Parser)]
#[command(name = "threatload", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/threatload.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create collections and, in pipeline mode, register the enrichment
    /// pipeline. Idempotent.
    Init {
        /// Override `ingest.enrichment`.
        #[arg(long, value_enum)]
        mode: Option<EnrichmentMode>,
    },

    /// Load a CSV file (columns: text, label, timestamp).
    ///
    /// Rows are enriched (locally or by the backend pipeline), submitted
    /// in batches, and the status flag is written when all batches are done.
    Load {
        /// Input CSV. Defaults to `ingest.csv_path`.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Rows per bulk request. Defaults to `ingest.batch_size`.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Where enrichment runs. Defaults to `ingest.enrichment`.
        #[arg(long, value_enum)]
        mode: Option<EnrichmentMode>,

        /// Read inputs and print counts without contacting the backend.
        #[arg(long)]
        dry_run: bool,

        /// Progress output on stderr. Defaults to human on a TTY, else off.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Print the status flag.
    Status,

    /// Print the enrichment of a text as JSON.
    Enrich {
        /// Text to classify.
        text: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("threatload=info,threatload_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init { mode } => {
            load::run_init(&cfg, mode).await?;
        }
        Commands::Load {
            csv,
            batch_size,
            mode,
            dry_run,
            progress,
        } => {
            let opts = LoadOptions {
                csv_path: csv,
                batch_size,
                mode,
                dry_run,
            };
            let reporter = progress.unwrap_or_else(ProgressMode::default_for_tty).reporter();
            load::run_load(&cfg, &opts, reporter.as_ref()).await?;
        }
        Commands::Status => {
            status::run_status(&cfg).await?;
        }
        Commands::Enrich { text } => {
            enrich_cmd::run_enrich(&cfg, &text)?;
        }
    }

    Ok(())
}
