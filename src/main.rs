//! # docledger CLI (`dlg`)
//!
//! The `dlg` binary is the primary interface for docledger. It provides
//! commands for database initialization, repository scanning, semantic
//! search, documentation generation, and feedback capture.
//!
//! ## Usage
//!
//! ```bash
//! dlg --config ./dlg.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dlg init` | Create the SQLite database and run schema migrations |
//! | `dlg scan` | Hash, diff, chunk, and embed the repository |
//! | `dlg search "<query>"` | Semantic search over indexed code chunks |
//! | `dlg generate <doc-type>` | Return a valid artifact, regenerating if stale |
//! | `dlg history <doc-type>` | List all stored versions of a doc type |
//! | `dlg changes` | Show the change audit trail |
//! | `dlg feedback <artifact-id>` | Attach a rating, comment, or correction |
//! | `dlg status` | Ledger and index overview |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! dlg init --config ./dlg.toml
//!
//! # Incremental scan of the configured root
//! dlg scan --config ./dlg.toml
//!
//! # Scan with a git cross-check against a ref
//! dlg scan --since-ref main --config ./dlg.toml
//!
//! # Semantic search
//! dlg search "impact propagation" --top-k 5 --config ./dlg.toml
//!
//! # Generate (or reuse) the README
//! dlg generate readme --output README.md --config ./dlg.toml
//!
//! # Rate an artifact
//! dlg feedback 3 --rating 4 --comment "missing setup steps"
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docledger::{changes, config, db, generate, migrate, scan, search, stats};

/// docledger CLI — incremental documentation regeneration for codebases.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/dlg.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "dlg",
    about = "docledger — incremental documentation regeneration for codebases",
    version,
    long_about = "docledger tracks every source file by content hash, propagates changes through \
    the dependency graph, and regenerates only the documentation artifacts whose contributing \
    files actually changed, using context retrieved from a chunk-level vector index."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./dlg.toml`. Database, scan, embedding, generator,
    /// and doc-type settings are read from this file.
    #[arg(long, global = true, default_value = "./dlg.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables (files,
    /// dependency_edges, chunks, chunk_vectors, changes, artifacts,
    /// feedback). This command is idempotent — running it multiple times
    /// is safe.
    Init,

    /// Scan the repository and record changes.
    ///
    /// Walks the configured root, hashes every matching file, records adds,
    /// modifications, and deletions in the ledger, refreshes dependency
    /// edges and the vector index, and marks affected documentation stale.
    Scan {
        /// Cross-check detected changes against `git diff --name-status <ref>`.
        /// Hash observations win on disagreement.
        #[arg(long)]
        since_ref: Option<String>,
    },

    /// Semantic search over indexed code chunks.
    ///
    /// Embeds the query and returns the most similar live chunks by cosine
    /// similarity. Requires an embedding provider to be configured.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results to return.
        #[arg(long, default_value_t = 8)]
        top_k: usize,
    },

    /// Return a valid documentation artifact, regenerating if stale.
    ///
    /// A fresh artifact whose fingerprint matches the current contributing
    /// set is returned without calling the generator. Concurrent requests
    /// for the same doc type share a single generation.
    Generate {
        /// Doc type: readme, api, architecture, onboarding, changelog,
        /// or module:<name>.
        doc_type: String,

        /// Write the artifact content to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// List all stored versions of a doc type, newest first.
    History {
        /// Doc type: readme, api, architecture, onboarding, changelog,
        /// or module:<name>.
        doc_type: String,
    },

    /// Show the change audit trail, newest first.
    Changes {
        /// Maximum number of change records to show.
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },

    /// Attach feedback to a generated artifact version.
    ///
    /// Feedback never mutates the artifact; superseded versions can still
    /// receive feedback.
    Feedback {
        /// Artifact id (shown by `dlg generate` and `dlg history`).
        artifact_id: i64,

        /// Rating from 1 to 5.
        #[arg(long)]
        rating: Option<i64>,

        /// Free-form comment.
        #[arg(long)]
        comment: Option<String>,

        /// Proposed corrected text.
        #[arg(long)]
        correction: Option<String>,
    },

    /// Show ledger, index, and artifact status.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db.path).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Scan { since_ref } => {
            scan::run_scan(&cfg, since_ref.as_deref()).await?;
        }
        Commands::Search { query, top_k } => {
            search::run_search(&cfg, &query, top_k).await?;
        }
        Commands::Generate { doc_type, output } => {
            generate::run_generate(&cfg, &doc_type, output.as_deref()).await?;
        }
        Commands::History { doc_type } => {
            generate::run_history(&cfg, &doc_type).await?;
        }
        Commands::Changes { limit } => {
            changes::run_changes(&cfg, limit).await?;
        }
        Commands::Feedback {
            artifact_id,
            rating,
            comment,
            correction,
        } => {
            generate::run_feedback(
                &cfg,
                artifact_id,
                rating,
                comment.as_deref(),
                correction.as_deref(),
            )
            .await?;
        }
        Commands::Status => {
            stats::run_status(&cfg).await?;
        }
    }

    Ok(())
}
