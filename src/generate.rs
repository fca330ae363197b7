//! Documentation generation and history commands.
//!
//! `dlg generate` asks the invalidation manager for a valid artifact,
//! regenerating only when the contributing set's fingerprint no longer
//! matches. `dlg history` lists every stored version of a doc type, and
//! `dlg feedback` attaches reader feedback to a specific artifact version.

use std::path::Path;

use anyhow::{bail, Result};

use crate::config::Config;
use crate::db;
use crate::embedding::create_provider;
use crate::feedback::{FeedbackSink, SqliteFeedback};
use crate::generator::create_generator;
use crate::index::VectorIndex;
use crate::invalidation::{DocCatalog, InvalidationManager};
use crate::ledger::FileLedger;
use crate::migrate::run_migrations;
use crate::models::DocType;

async fn build_manager(config: &Config) -> Result<(sqlx::SqlitePool, InvalidationManager)> {
    let pool = db::connect(&config.db.path).await?;
    run_migrations(&pool).await?;

    let provider = create_provider(&config.embedding)?;
    let generator = create_generator(&config.generator)?;
    let ledger = FileLedger::new(pool.clone());
    let index = VectorIndex::new(
        pool.clone(),
        provider,
        config.index.tombstone_compact_ratio,
    );
    let catalog = DocCatalog::from_config(&config.docs)?;

    let manager = InvalidationManager::new(
        pool.clone(),
        ledger,
        index,
        generator,
        catalog,
        config.index.retrieval_top_k,
    );
    Ok((pool, manager))
}

pub async fn run_generate(
    config: &Config,
    doc_type_str: &str,
    output: Option<&Path>,
) -> Result<()> {
    let Some(doc_type) = DocType::parse(doc_type_str) else {
        bail!(
            "Unknown doc type '{}'. Must be readme, api, architecture, onboarding, changelog, or module:<name>.",
            doc_type_str
        );
    };

    let (pool, manager) = build_manager(config).await?;
    let artifact = manager.get_or_generate(&doc_type).await?;

    match output {
        Some(path) => {
            std::fs::write(path, &artifact.content)?;
            println!(
                "{} v{} (artifact {}) written to {}",
                artifact.doc_type,
                artifact.version,
                artifact.id,
                path.display()
            );
        }
        None => {
            println!("{}", artifact.content);
        }
    }

    pool.close().await;
    Ok(())
}

pub async fn run_history(config: &Config, doc_type_str: &str) -> Result<()> {
    let Some(doc_type) = DocType::parse(doc_type_str) else {
        bail!("Unknown doc type '{}'", doc_type_str);
    };

    let (pool, manager) = build_manager(config).await?;
    let history = manager.history(&doc_type).await?;

    if history.is_empty() {
        println!("No artifacts for {}", doc_type);
        pool.close().await;
        return Ok(());
    }

    println!("History for {}:", doc_type);
    println!(
        "  {:>4} {:>8} {:>12}   {:<20} {}",
        "ID", "VERSION", "STATUS", "GENERATED", "FINGERPRINT"
    );
    for artifact in &history {
        let ts = chrono::DateTime::from_timestamp(artifact.generated_at, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| artifact.generated_at.to_string());
        println!(
            "  {:>4} {:>8} {:>12}   {:<20} {}",
            artifact.id,
            artifact.version,
            artifact.status.as_str(),
            ts,
            &artifact.fingerprint[..12.min(artifact.fingerprint.len())]
        );
    }

    pool.close().await;
    Ok(())
}

pub async fn run_feedback(
    config: &Config,
    artifact_id: i64,
    rating: Option<i64>,
    comment: Option<&str>,
    correction: Option<&str>,
) -> Result<()> {
    let pool = db::connect(&config.db.path).await?;
    run_migrations(&pool).await?;

    let sink = SqliteFeedback::new(pool.clone());
    sink.record(artifact_id, rating, comment, correction).await?;

    let summary = sink.summary(None).await?;
    println!("Feedback recorded for artifact {}.", artifact_id);
    println!(
        "  total: {}, avg rating: {}, corrections: {}",
        summary.total,
        summary
            .avg_rating
            .map(|r| format!("{:.1}", r))
            .unwrap_or_else(|| "n/a".to_string()),
        summary.corrections
    );

    pool.close().await;
    Ok(())
}
