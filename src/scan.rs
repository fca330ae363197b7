//! Scan pipeline orchestration.
//!
//! Coordinates the full incremental flow: walk → ledger → dependency
//! extraction → chunking → embedding → deletion detection → vcs
//! reconciliation → impact invalidation → index compaction. Embedding
//! failures are non-fatal per chunk; chunks left unembedded are picked up
//! on a later scan.

use std::collections::HashSet;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::warn;
use walkdir::WalkDir;

use crate::chunker::{chunk_source, detect_language};
use crate::config::Config;
use crate::db;
use crate::deps::{extract_imports, resolve_dependencies};
use crate::embedding::create_provider;
use crate::error::CoreError;
use crate::generator::create_generator;
use crate::index::VectorIndex;
use crate::invalidation::{DocCatalog, InvalidationManager};
use crate::ledger::FileLedger;
use crate::migrate::run_migrations;
use crate::models::{ChangeRecord, ChangeType};
use crate::vcs::{ChangeSource, GitChangeSource};

/// Directories never worth scanning, on top of configured excludes.
const DEFAULT_EXCLUDES: &[&str] = &[
    "**/.git/**",
    "**/target/**",
    "**/node_modules/**",
    "**/__pycache__/**",
];

pub async fn run_scan(config: &Config, since_ref: Option<&str>) -> Result<()> {
    let pool = db::connect(&config.db.path).await?;
    run_migrations(&pool).await?;

    let provider = create_provider(&config.embedding)?;
    let ledger = FileLedger::new(pool.clone());
    let index = VectorIndex::new(
        pool.clone(),
        provider,
        config.index.tombstone_compact_ratio,
    );

    let include = build_globset(&config.scan.include_globs)?;
    let exclude = build_globset(
        &config
            .scan
            .exclude_globs
            .iter()
            .cloned()
            .chain(DEFAULT_EXCLUDES.iter().map(|s| s.to_string()))
            .collect::<Vec<_>>(),
    )?;

    // Walk the tree, collecting relative paths in sorted order so scans are
    // deterministic.
    let mut files: Vec<(String, String)> = Vec::new();
    for entry in WalkDir::new(&config.scan.root)
        .follow_links(config.scan.follow_symlinks)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| "failed to walk scan root")?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(&config.scan.root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        if !include.is_match(&rel) || exclude.is_match(&rel) {
            continue;
        }
        match std::fs::read_to_string(entry.path()) {
            Ok(content) => files.push((rel, content)),
            Err(e) => {
                warn!(path = %rel, error = %e, "skipping unreadable file");
            }
        }
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let scanned: HashSet<String> = files.iter().map(|(p, _)| p.clone()).collect();
    let all_paths: Vec<String> = files.iter().map(|(p, _)| p.clone()).collect();

    let mut hash_changes: Vec<ChangeRecord> = Vec::new();
    let mut chunks_embedded = 0u64;
    let mut chunks_pending = 0u64;
    let mut chunks_unchanged = 0u64;

    for (path, content) in &files {
        let language = detect_language(path);
        let change = ledger.record_scan(path, content, language).await?;

        let Some(change) = change else { continue };
        hash_changes.push(change);

        // Content moved: retire the old chunks before indexing the new.
        index.remove_chunks_of_file(path).await?;

        let imports = extract_imports(content, language);
        let edges = resolve_dependencies(path, &imports, &all_paths);
        ledger.set_dependencies(path, &edges).await?;

        for chunk in chunk_source(path, content, language) {
            match index.add_chunk(&chunk).await {
                Ok(true) => chunks_embedded += 1,
                Ok(false) => chunks_unchanged += 1,
                Err(CoreError::Provider(e)) => {
                    // Chunk row is stored; embedding retried next scan.
                    if chunks_pending == 0 {
                        warn!(error = %e, "embedding unavailable; chunks left pending");
                    }
                    chunks_pending += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    // Backfill chunks a previous scan left unembedded; their files may be
    // unchanged this time, so the loop above never revisits them.
    if config.embedding.is_enabled() {
        let (backfilled, still_pending) =
            index.embed_pending(config.embedding.batch_size).await?;
        chunks_embedded += backfilled;
        chunks_pending = still_pending;
    }

    let deletions = ledger.detect_deletions(&scanned).await?;
    for deletion in &deletions {
        index.remove_chunks_of_file(&deletion.path).await?;
        ledger.set_dependencies(&deletion.path, &[]).await?;
        hash_changes.push(deletion.clone());
    }

    // Cross-check against git when available; hash observations win.
    let git = GitChangeSource::new(&config.scan.root);
    if since_ref.is_some() || git.is_git_repo() {
        match git.diff(since_ref) {
            Ok(vcs_changes) => {
                hash_changes = ledger
                    .reconcile_with_source(&vcs_changes, &hash_changes)
                    .await?;
            }
            Err(e) => {
                warn!(error = %e, "vcs diff unavailable; using hash changes only");
            }
        }
    }

    // Propagate the change set through the dependency graph and mark
    // affected artifacts stale.
    let changed: HashSet<String> = hash_changes.iter().map(|c| c.path.clone()).collect();
    let mut invalidated = Vec::new();
    if !changed.is_empty() {
        let impact = ledger
            .compute_impact(&changed, config.impact.max_depth)
            .await?;

        let generator = create_generator(&config.generator)?;
        let catalog = DocCatalog::from_config(&config.docs)?;
        let manager = InvalidationManager::new(
            pool.clone(),
            ledger.clone(),
            index.clone(),
            generator,
            catalog,
            config.index.retrieval_top_k,
        );
        invalidated = manager.apply_impact(&impact).await?;

        if impact.truncated {
            warn!(
                max_depth = ?config.impact.max_depth,
                "impact traversal hit depth cap; result is partial"
            );
        }
    }

    let compacted = index.compact_if_needed().await?;

    let added = hash_changes
        .iter()
        .filter(|c| c.change_type == ChangeType::Added)
        .count();
    let modified = hash_changes
        .iter()
        .filter(|c| c.change_type == ChangeType::Modified)
        .count();

    println!("scan {}", config.scan.root.display());
    println!("  files seen: {}", files.len());
    println!("  added: {}", added);
    println!("  modified: {}", modified);
    println!("  deleted: {}", deletions.len());
    println!("  chunks unchanged: {}", chunks_unchanged);
    if config.embedding.is_enabled() {
        println!("  chunks embedded: {}", chunks_embedded);
        println!("  chunks pending: {}", chunks_pending);
    }
    if !invalidated.is_empty() {
        let names: Vec<String> = invalidated.iter().map(|d| d.to_string()).collect();
        println!("  invalidated docs: {}", names.join(", "));
    }
    if compacted {
        println!("  index compacted");
    }
    println!("ok");

    pool.close().await;
    Ok(())
}

fn build_globset(globs: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for glob in globs {
        builder.add(Glob::new(glob).with_context(|| format!("invalid glob: {}", glob))?);
    }
    Ok(builder.build()?)
}
