//! Change audit trail listing.

use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::ledger::FileLedger;
use crate::migrate::run_migrations;

pub async fn run_changes(config: &Config, limit: i64) -> Result<()> {
    let pool = db::connect(&config.db.path).await?;
    run_migrations(&pool).await?;

    let ledger = FileLedger::new(pool.clone());
    let changes = ledger.recent_changes(limit).await?;

    if changes.is_empty() {
        println!("No recorded changes.");
        pool.close().await;
        return Ok(());
    }

    println!("Recent changes (newest first):");
    for change in &changes {
        let ts = chrono::DateTime::from_timestamp(change.detected_at, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| change.detected_at.to_string());
        let hash = change
            .new_hash
            .as_deref()
            .or(change.old_hash.as_deref())
            .unwrap_or("-");
        println!(
            "  {:<16} {:<10} {:<6} {}  {}",
            ts,
            change.change_type.as_str(),
            change.origin.as_str(),
            &hash[..12.min(hash.len())],
            change.path
        );
    }

    pool.close().await;
    Ok(())
}
