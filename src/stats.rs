//! Ledger and index health overview.
//!
//! Provides a quick summary of what's tracked: file and edge counts, chunk
//! and vector counts, and the state of each configured doc type. Used by
//! `dlg status` to give confidence that scans and generation are working
//! as expected.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;
use crate::migrate::run_migrations;

/// Per-doc-type artifact summary line.
struct DocStats {
    doc_type: String,
    version: i64,
    status: String,
    generated_at: i64,
}

/// Run the status command: query the database and print a summary.
pub async fn run_status(config: &Config) -> Result<()> {
    let pool = db::connect(&config.db.path).await?;
    run_migrations(&pool).await?;

    let tracked_files: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM files WHERE deleted = 0")
            .fetch_one(&pool)
            .await?;

    let deleted_files: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM files WHERE deleted = 1")
            .fetch_one(&pool)
            .await?;

    let edges: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dependency_edges")
        .fetch_one(&pool)
        .await?;

    let chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
        .fetch_one(&pool)
        .await?;

    let live_vectors: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors WHERE tombstoned = 0")
            .fetch_one(&pool)
            .await?;

    let tombstoned_vectors: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors WHERE tombstoned = 1")
            .fetch_one(&pool)
            .await?;

    let recent_changes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM changes")
        .fetch_one(&pool)
        .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("docledger — Status");
    println!("==================");
    println!();
    println!("  Database:     {}", config.db.path.display());
    println!("  Size:         {}", format_bytes(db_size));
    println!();
    println!("  Tracked files: {}", tracked_files);
    println!("  Deleted files: {}", deleted_files);
    println!("  Dependency edges: {}", edges);
    println!("  Chunks:       {}", chunks);
    println!(
        "  Vectors:      {} live, {} tombstoned",
        live_vectors, tombstoned_vectors
    );
    println!("  Change records: {}", recent_changes);

    // Latest non-superseded artifact per doc type.
    let doc_rows = sqlx::query(
        r#"
        SELECT doc_type, version, status, generated_at
        FROM artifacts a
        WHERE status IN ('fresh', 'stale')
          AND version = (SELECT MAX(version) FROM artifacts WHERE doc_type = a.doc_type)
        ORDER BY doc_type
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let doc_stats: Vec<DocStats> = doc_rows
        .iter()
        .map(|row| DocStats {
            doc_type: row.get("doc_type"),
            version: row.get("version"),
            status: row.get("status"),
            generated_at: row.get("generated_at"),
        })
        .collect();

    if !doc_stats.is_empty() {
        println!();
        println!("  Documentation:");
        println!(
            "  {:<20} {:>8} {:>10}   {}",
            "DOC TYPE", "VERSION", "STATUS", "GENERATED"
        );
        println!("  {}", "-".repeat(60));

        for d in &doc_stats {
            println!(
                "  {:<20} {:>8} {:>10}   {}",
                d.doc_type,
                d.version,
                d.status,
                format_ts_relative(d.generated_at)
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let delta = now - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
