//! # Tariff Classifier CLI (`tclass`)
//!
//! ## Usage
//!
//! ```bash
//! tclass --config ./config/tclass.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `tclass init` | Create the SQLite database and run schema migrations |
//! | `tclass import catalog <file>` | Load catalog records from JSONL |
//! | `tclass import contexts <file>` | Load company profiles from JSONL |
//! | `tclass classify "<text>"` | Rank classification codes for a description |
//! | `tclass stats` | Catalog counts and cache settings |
//! | `tclass serve` | Start the HTTP server |
//!
//! Logs go to stderr and are filtered by `RUST_LOG`
//! (default `tariff_classifier=info`).

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use tariff_classifier::import::{self, ImportKind};
use tariff_classifier::{classify, config, migrate, server, stats};

/// Tariff Classifier CLI: ranks tariff classification codes for product
/// descriptions.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/tclass.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "tclass",
    about = "Rank tariff classification codes for free-text product descriptions",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/tclass.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the catalog, catalog_fts and
    /// company_context tables. Running it repeatedly is safe.
    Init,

    /// Import JSONL data into the database.
    ///
    /// Invalid rows are skipped and counted.
    Import {
        #[arg(value_enum)]
        kind: ImportTarget,

        /// Path to a JSONL file, one object per line.
        path: PathBuf,
    },

    /// Classify a product description.
    Classify {
        /// Free-text product description.
        text: String,

        /// Company id whose search profile biases the ranking.
        #[arg(long)]
        company: Option<String>,

        /// Maximum number of results.
        #[arg(long)]
        limit: Option<usize>,

        /// Print the response as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show catalog statistics.
    Stats,

    /// Start the HTTP server on `[server] bind`.
    Serve,
}

#[derive(Clone, Copy, ValueEnum)]
enum ImportTarget {
    Catalog,
    Contexts,
}

impl From<ImportTarget> for ImportKind {
    fn from(t: ImportTarget) -> Self {
        match t {
            ImportTarget::Catalog => ImportKind::Catalog,
            ImportTarget::Contexts => ImportKind::Contexts,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tariff_classifier=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import { kind, path } => {
            let summary = import::run_import(&cfg, kind.into(), &path).await?;
            println!(
                "Imported {} rows ({} skipped).",
                summary.imported, summary.skipped
            );
        }
        Commands::Classify {
            text,
            company,
            limit,
            json,
        } => {
            classify::run_classify(&cfg, &text, company, limit, json).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
