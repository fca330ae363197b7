//! Semantic search command.
//!
//! Embeds the query, scores it against every live chunk vector, and prints
//! the ranked results with paths, line ranges, and a text snippet.

use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::embedding::create_provider;
use crate::index::VectorIndex;
use crate::migrate::run_migrations;

pub async fn run_search(config: &Config, query: &str, top_k: usize) -> Result<()> {
    let pool = db::connect(&config.db.path).await?;
    run_migrations(&pool).await?;

    let provider = create_provider(&config.embedding)?;
    let index = VectorIndex::new(
        pool.clone(),
        provider,
        config.index.tombstone_compact_ratio,
    );

    let hits = index.search(query, top_k).await?;

    if hits.is_empty() {
        println!("No results for \"{}\"", query);
        pool.close().await;
        return Ok(());
    }

    println!("Results for \"{}\":", query);
    println!();

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. {} — {} (lines {}-{})  [score: {:.4}]",
            i + 1,
            hit.path,
            hit.name,
            hit.start_line,
            hit.end_line,
            hit.score
        );
        println!("   {}", snippet(&hit.text, 160));
        println!();
    }

    pool.close().await;
    Ok(())
}

/// First line(s) of the chunk, truncated to `max_chars`.
fn snippet(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.len() <= max_chars {
        flat
    } else {
        let mut end = max_chars;
        while !flat.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &flat[..end])
    }
}
