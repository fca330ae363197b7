//! End-to-end tests over a real temporary SQLite database.
//!
//! Embedding and generation use deterministic in-process mocks, so every
//! test runs offline and produces the same results on every run.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::SqlitePool;
use tempfile::TempDir;

use docledger::chunker::chunk_source;
use docledger::config::DocsConfig;
use docledger::db;
use docledger::embedding::EmbeddingProvider;
use docledger::error::CoreError;
use docledger::feedback::{FeedbackSink, SqliteFeedback};
use docledger::generator::DocumentGenerator;
use docledger::index::VectorIndex;
use docledger::invalidation::{DocCatalog, InvalidationManager};
use docledger::ledger::FileLedger;
use docledger::migrate::run_migrations;
use docledger::models::{
    ArtifactStatus, ChangeType, CodeChunk, DependencyEdge, DocType, EdgeKind, SearchHit, VcsChange,
};

async fn setup() -> (TempDir, SqlitePool) {
    let dir = tempfile::tempdir().unwrap();
    let pool = db::connect(&dir.path().join("test.sqlite")).await.unwrap();
    run_migrations(&pool).await.unwrap();
    (dir, pool)
}

/// Deterministic embedder: folds byte values into a fixed-size vector.
/// Similar texts get similar vectors; identical texts get identical ones.
struct HashEmbedder {
    dims: usize,
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-embedder"
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CoreError> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0f32; self.dims];
                for (i, b) in text.bytes().enumerate() {
                    v[i % self.dims] += b as f32 / 255.0;
                }
                v[0] += 1.0;
                v
            })
            .collect())
    }
}

/// Returns the same vector for every input, forcing score ties.
struct ConstEmbedder {
    dims: usize,
}

#[async_trait]
impl EmbeddingProvider for ConstEmbedder {
    fn model_name(&self) -> &str {
        "const-embedder"
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CoreError> {
        Ok(texts.iter().map(|_| vec![1.0f32; self.dims]).collect())
    }
}

/// Always fails, standing in for a provider outage.
struct OutageEmbedder;

#[async_trait]
impl EmbeddingProvider for OutageEmbedder {
    fn model_name(&self) -> &str {
        "outage-embedder"
    }
    fn dims(&self) -> usize {
        8
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, CoreError> {
        Err(CoreError::Provider("connection refused".to_string()))
    }
}

/// Counts generator invocations; slow enough to widen the dedup window.
struct CountingGenerator {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl DocumentGenerator for CountingGenerator {
    fn model_name(&self) -> &str {
        "counting-generator"
    }
    async fn generate(
        &self,
        doc_type: &DocType,
        _context: &[SearchHit],
    ) -> Result<String, CoreError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("# {} documentation\n\ngeneration {}", doc_type, n))
    }
}

struct FailingGenerator;

#[async_trait]
impl DocumentGenerator for FailingGenerator {
    fn model_name(&self) -> &str {
        "failing-generator"
    }
    async fn generate(
        &self,
        _doc_type: &DocType,
        _context: &[SearchHit],
    ) -> Result<String, CoreError> {
        Err(CoreError::Generation("model unavailable".to_string()))
    }
}

fn make_manager(
    pool: &SqlitePool,
    generator: Arc<dyn DocumentGenerator>,
) -> InvalidationManager {
    let ledger = FileLedger::new(pool.clone());
    let index = VectorIndex::new(pool.clone(), Arc::new(HashEmbedder { dims: 8 }), 0.3);
    let catalog = DocCatalog::from_config(&DocsConfig::default()).unwrap();
    InvalidationManager::new(pool.clone(), ledger, index, generator, catalog, 8)
}

fn chunk(path: &str, name: &str, start: i64, text: &str) -> CodeChunk {
    CodeChunk {
        id: CodeChunk::derive_id(path, name, start),
        path: path.to_string(),
        name: name.to_string(),
        start_line: start,
        end_line: start + 2,
        language: "python".to_string(),
        text: text.to_string(),
        hash: docledger::chunker::hash_text(text),
        embedded: false,
    }
}

// ---------- ledger ----------

#[tokio::test]
async fn test_record_scan_add_then_idempotent() {
    let (_dir, pool) = setup().await;
    let ledger = FileLedger::new(pool.clone());

    let change = ledger
        .record_scan("src/a.py", "def alpha(): pass", "python")
        .await
        .unwrap();
    let change = change.expect("first scan records an add");
    assert_eq!(change.change_type, ChangeType::Added);
    assert!(change.old_hash.is_none());
    assert!(change.new_hash.is_some());

    // Same content again: no change, no audit entry.
    let repeat = ledger
        .record_scan("src/a.py", "def alpha(): pass", "python")
        .await
        .unwrap();
    assert!(repeat.is_none());

    let changes = ledger.recent_changes(10).await.unwrap();
    assert_eq!(changes.len(), 1);
}

#[tokio::test]
async fn test_record_scan_modified_carries_both_hashes() {
    let (_dir, pool) = setup().await;
    let ledger = FileLedger::new(pool.clone());

    let added = ledger
        .record_scan("src/a.py", "v1", "python")
        .await
        .unwrap()
        .unwrap();

    let modified = ledger
        .record_scan("src/a.py", "v2", "python")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(modified.change_type, ChangeType::Modified);
    assert_eq!(modified.old_hash, added.new_hash);
    assert_ne!(modified.new_hash, modified.old_hash);
}

#[tokio::test]
async fn test_detect_deletions_and_reappearance() {
    let (_dir, pool) = setup().await;
    let ledger = FileLedger::new(pool.clone());

    ledger.record_scan("a.py", "a", "python").await.unwrap();
    ledger.record_scan("b.py", "b", "python").await.unwrap();

    let scanned: HashSet<String> = ["a.py".to_string()].into_iter().collect();
    let deletions = ledger.detect_deletions(&scanned).await.unwrap();
    assert_eq!(deletions.len(), 1);
    assert_eq!(deletions[0].path, "b.py");
    assert_eq!(deletions[0].change_type, ChangeType::Deleted);

    // A second pass finds nothing new.
    let again = ledger.detect_deletions(&scanned).await.unwrap();
    assert!(again.is_empty());

    // Reappearance is a fresh add, not a modification.
    let back = ledger
        .record_scan("b.py", "b rewritten", "python")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(back.change_type, ChangeType::Added);
    assert!(back.old_hash.is_none());
}

#[tokio::test]
async fn test_reconcile_drops_vcs_only_changes() {
    let (_dir, pool) = setup().await;
    let ledger = FileLedger::new(pool.clone());

    ledger.record_scan("a.py", "same", "python").await.unwrap();

    // VCS claims a.py changed, but the content hash says otherwise.
    let vcs = vec![VcsChange {
        path: "a.py".to_string(),
        status: ChangeType::Modified,
    }];
    let reconciled = ledger.reconcile_with_source(&vcs, &[]).await.unwrap();
    assert!(reconciled.is_empty());
}

#[tokio::test]
async fn test_impact_transitive_with_cycle() {
    let (_dir, pool) = setup().await;
    let ledger = FileLedger::new(pool.clone());

    // b imports a, c imports b, and a imports c (a cycle).
    for (from, to) in [("b.py", "a.py"), ("c.py", "b.py"), ("a.py", "c.py")] {
        ledger
            .add_dependency(&DependencyEdge {
                from: from.to_string(),
                to: to.to_string(),
                kind: EdgeKind::Import,
            })
            .await
            .unwrap();
    }

    let changed: HashSet<String> = ["a.py".to_string()].into_iter().collect();
    let impact = ledger.compute_impact(&changed, None).await.unwrap();

    let expected: HashSet<String> = ["a.py", "b.py", "c.py"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(impact.files, expected);
    assert!(!impact.truncated);
}

#[tokio::test]
async fn test_impact_depth_cap_flags_truncation() {
    let (_dir, pool) = setup().await;
    let ledger = FileLedger::new(pool.clone());

    for (from, to) in [("b.py", "a.py"), ("c.py", "b.py"), ("d.py", "c.py")] {
        ledger
            .add_dependency(&DependencyEdge {
                from: from.to_string(),
                to: to.to_string(),
                kind: EdgeKind::Import,
            })
            .await
            .unwrap();
    }

    let changed: HashSet<String> = ["a.py".to_string()].into_iter().collect();
    let impact = ledger.compute_impact(&changed, Some(1)).await.unwrap();

    assert!(impact.files.contains("a.py"));
    assert!(impact.files.contains("b.py"));
    assert!(!impact.files.contains("d.py"));
    assert!(impact.truncated);
}

#[tokio::test]
async fn test_contributing_set_selector() {
    let (_dir, pool) = setup().await;
    let ledger = FileLedger::new(pool.clone());

    ledger
        .record_scan("src/core/a.py", "a", "python")
        .await
        .unwrap();
    ledger
        .record_scan("docs/readme.md", "r", "unknown")
        .await
        .unwrap();

    let all = ledger.contributing_set(&[]).await.unwrap();
    assert_eq!(all.len(), 2);

    let tracked = ledger.tracked_paths().await.unwrap();
    assert_eq!(tracked, vec!["docs/readme.md", "src/core/a.py"]);

    let core_only = ledger
        .contributing_set(&["src/core/**".to_string()])
        .await
        .unwrap();
    assert_eq!(core_only.len(), 1);
    assert_eq!(core_only[0].0, "src/core/a.py");
}

// ---------- vector index ----------

#[tokio::test]
async fn test_search_returns_all_when_top_k_exceeds_live() {
    let (_dir, pool) = setup().await;
    let index = VectorIndex::new(pool.clone(), Arc::new(HashEmbedder { dims: 8 }), 0.3);

    assert!(index
        .add_chunk(&chunk("a.py", "alpha", 1, "def alpha(): return 1"))
        .await
        .unwrap());
    assert!(index
        .add_chunk(&chunk("b.py", "beta", 1, "def beta(): return 2"))
        .await
        .unwrap());

    let hits = index.search("alpha", 50).await.unwrap();
    assert_eq!(hits.len(), 2);
}

#[tokio::test]
async fn test_search_deterministic_across_runs() {
    let (_dir, pool) = setup().await;
    let index = VectorIndex::new(pool.clone(), Arc::new(HashEmbedder { dims: 8 }), 0.3);

    for (path, name, text) in [
        ("a.py", "alpha", "def alpha(): return compute()"),
        ("b.py", "beta", "def beta(): return alpha() + 1"),
        ("c.py", "gamma", "class Gamma: pass"),
    ] {
        index.add_chunk(&chunk(path, name, 1, text)).await.unwrap();
    }

    let first = index.search("return alpha", 3).await.unwrap();
    let second = index.search("return alpha", 3).await.unwrap();
    let ids1: Vec<&str> = first.iter().map(|h| h.chunk_id.as_str()).collect();
    let ids2: Vec<&str> = second.iter().map(|h| h.chunk_id.as_str()).collect();
    assert_eq!(ids1, ids2);
}

#[tokio::test]
async fn test_search_ties_break_by_chunk_id() {
    let (_dir, pool) = setup().await;
    let index = VectorIndex::new(pool.clone(), Arc::new(ConstEmbedder { dims: 4 }), 0.3);

    index
        .add_chunk(&chunk("z.py", "zeta", 1, "zeta"))
        .await
        .unwrap();
    index
        .add_chunk(&chunk("a.py", "alpha", 1, "alpha"))
        .await
        .unwrap();
    index
        .add_chunk(&chunk("m.py", "mu", 1, "mu"))
        .await
        .unwrap();

    // Every score is identical, so ordering falls back to ascending id.
    let hits = index.search("anything", 3).await.unwrap();
    let ids: Vec<&str> = hits.iter().map(|h| h.chunk_id.as_str()).collect();
    assert_eq!(ids, vec!["a.py:alpha:1", "m.py:mu:1", "z.py:zeta:1"]);
}

#[tokio::test]
async fn test_readd_unchanged_chunk_is_noop() {
    let (_dir, pool) = setup().await;
    let index = VectorIndex::new(pool.clone(), Arc::new(HashEmbedder { dims: 8 }), 0.3);

    let c = chunk("a.py", "alpha", 1, "def alpha(): pass");
    assert!(index.add_chunk(&c).await.unwrap());
    assert!(!index.add_chunk(&c).await.unwrap());
}

#[tokio::test]
async fn test_tombstoned_chunks_excluded_then_compacted() {
    let (_dir, pool) = setup().await;
    let index = VectorIndex::new(pool.clone(), Arc::new(HashEmbedder { dims: 8 }), 0.3);

    index
        .add_chunk(&chunk("a.py", "alpha", 1, "alpha body"))
        .await
        .unwrap();
    index
        .add_chunk(&chunk("a.py", "beta", 5, "beta body"))
        .await
        .unwrap();
    index
        .add_chunk(&chunk("b.py", "gamma", 1, "gamma body"))
        .await
        .unwrap();

    let removed = index.remove_chunks_of_file("a.py").await.unwrap();
    assert_eq!(removed, 2);

    // Tombstoned vectors are invisible to search before compaction runs.
    let hits = index.search("alpha body", 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].path, "b.py");

    // 2 of 3 vectors dead: ratio 0.66 > 0.3, so compaction fires.
    assert!(index.compact_if_needed().await.unwrap());
    assert_eq!(index.tombstone_ratio().await.unwrap(), 0.0);

    // Nothing left to compact.
    assert!(!index.compact_if_needed().await.unwrap());

    let stats = index.stats().await.unwrap();
    assert_eq!(stats.live, 1);
    assert_eq!(stats.tombstoned, 0);
}

#[tokio::test]
async fn test_dims_mismatch_rejected() {
    let (_dir, pool) = setup().await;

    let index4 = VectorIndex::new(pool.clone(), Arc::new(HashEmbedder { dims: 4 }), 0.3);
    index4
        .add_chunk(&chunk("a.py", "alpha", 1, "alpha"))
        .await
        .unwrap();

    // Same store, different provider dimensionality.
    let index8 = VectorIndex::new(pool.clone(), Arc::new(HashEmbedder { dims: 8 }), 0.3);
    let err = index8
        .add_chunk(&chunk("b.py", "beta", 1, "beta"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Input(_)));

    let err = index8.search("query", 5).await.unwrap_err();
    assert!(matches!(err, CoreError::Input(_)));
}

#[tokio::test]
async fn test_chunked_file_indexes_per_definition() {
    let (_dir, pool) = setup().await;
    let index = VectorIndex::new(pool.clone(), Arc::new(HashEmbedder { dims: 8 }), 0.3);

    let source = "def alpha():\n    return 1\n\nclass Widget:\n    pass\n";
    let chunks = chunk_source("src/app.py", source, "python");
    assert_eq!(chunks.len(), 2);

    for c in &chunks {
        assert!(index.add_chunk(c).await.unwrap());
    }

    let hits = index.search("class Widget", 10).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.path == "src/app.py"));
}

#[tokio::test]
async fn test_embed_pending_recovers_chunks_after_outage() {
    let (_dir, pool) = setup().await;

    // The outage stores the chunk row but produces no vector.
    let down = VectorIndex::new(pool.clone(), Arc::new(OutageEmbedder), 0.3);
    let err = down
        .add_chunk(&chunk("a.py", "alpha", 1, "def alpha(): pass"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Provider(_)));

    // Once the provider is back, backfill embeds it without the file
    // having to change again.
    let up = VectorIndex::new(pool.clone(), Arc::new(HashEmbedder { dims: 8 }), 0.3);
    let (embedded, pending) = up.embed_pending(64).await.unwrap();
    assert_eq!(embedded, 1);
    assert_eq!(pending, 0);

    let hits = up.search("alpha", 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk_id, "a.py:alpha:1");

    // Nothing left to backfill.
    assert_eq!(up.embed_pending(64).await.unwrap(), (0, 0));
}

#[tokio::test]
async fn test_embed_pending_reports_remainder_while_down() {
    let (_dir, pool) = setup().await;

    let down = VectorIndex::new(pool.clone(), Arc::new(OutageEmbedder), 0.3);
    for (name, start) in [("alpha", 1), ("beta", 5)] {
        let err = down
            .add_chunk(&chunk("a.py", name, start, name))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Provider(_)));
    }

    // Still down: non-fatal, everything stays pending.
    let (embedded, pending) = down.embed_pending(64).await.unwrap();
    assert_eq!(embedded, 0);
    assert_eq!(pending, 2);
}

// ---------- invalidation ----------

#[tokio::test]
async fn test_generate_reuses_fresh_artifact() {
    let (_dir, pool) = setup().await;
    let ledger = FileLedger::new(pool.clone());
    ledger.record_scan("a.py", "v1", "python").await.unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let manager = make_manager(
        &pool,
        Arc::new(CountingGenerator {
            calls: calls.clone(),
        }),
    );

    let first = manager.get_or_generate(&DocType::Readme).await.unwrap();
    assert_eq!(first.version, 1);
    assert_eq!(first.status, ArtifactStatus::Fresh);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Nothing changed: same artifact back, no generator call.
    let second = manager.get_or_generate(&DocType::Readme).await.unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_modification_supersedes_and_regenerates() {
    let (_dir, pool) = setup().await;
    let ledger = FileLedger::new(pool.clone());
    ledger.record_scan("a.py", "v1", "python").await.unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let manager = make_manager(
        &pool,
        Arc::new(CountingGenerator {
            calls: calls.clone(),
        }),
    );

    let v1 = manager.get_or_generate(&DocType::Readme).await.unwrap();

    ledger.record_scan("a.py", "v2", "python").await.unwrap();

    let v2 = manager.get_or_generate(&DocType::Readme).await.unwrap();
    assert_eq!(v2.version, 2);
    assert_ne!(v2.fingerprint, v1.fingerprint);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let history = manager.history(&DocType::Readme).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].version, 2);
    assert_eq!(history[0].status, ArtifactStatus::Fresh);
    assert_eq!(history[1].version, 1);
    assert_eq!(history[1].status, ArtifactStatus::Superseded);
}

#[tokio::test]
async fn test_concurrent_requests_share_one_generation() {
    let (_dir, pool) = setup().await;
    let ledger = FileLedger::new(pool.clone());
    ledger.record_scan("a.py", "v1", "python").await.unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let manager = make_manager(
        &pool,
        Arc::new(CountingGenerator {
            calls: calls.clone(),
        }),
    );

    let mut handles = Vec::new();
    for _ in 0..8 {
        let m = manager.clone();
        handles.push(tokio::spawn(async move {
            m.get_or_generate(&DocType::Readme).await
        }));
    }

    let mut ids = HashSet::new();
    for handle in handles {
        let artifact = handle.await.unwrap().unwrap();
        ids.insert(artifact.id);
    }

    assert_eq!(ids.len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_generation_failure_keeps_previous_artifact() {
    let (_dir, pool) = setup().await;
    let ledger = FileLedger::new(pool.clone());
    ledger.record_scan("a.py", "v1", "python").await.unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let working = make_manager(
        &pool,
        Arc::new(CountingGenerator {
            calls: calls.clone(),
        }),
    );
    let v1 = working.get_or_generate(&DocType::Readme).await.unwrap();

    ledger.record_scan("a.py", "v2", "python").await.unwrap();

    let broken = make_manager(&pool, Arc::new(FailingGenerator));
    let err = broken.get_or_generate(&DocType::Readme).await.unwrap_err();
    assert!(matches!(err, CoreError::Generation(_)));

    // The failed attempt committed nothing; v1 is untouched.
    let history = broken.history(&DocType::Readme).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, v1.id);
    assert_eq!(history[0].status, ArtifactStatus::Fresh);
}

#[tokio::test]
async fn test_unconfigured_doc_type_rejected() {
    let (_dir, pool) = setup().await;
    let manager = make_manager(&pool, Arc::new(FailingGenerator));

    // Default catalog has readme/api/architecture only.
    let err = manager
        .get_or_generate(&DocType::Changelog)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Input(_)));
}

#[tokio::test]
async fn test_apply_impact_marks_stale() {
    let (_dir, pool) = setup().await;
    let ledger = FileLedger::new(pool.clone());
    ledger.record_scan("a.py", "v1", "python").await.unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let manager = make_manager(
        &pool,
        Arc::new(CountingGenerator {
            calls: calls.clone(),
        }),
    );
    manager.get_or_generate(&DocType::Readme).await.unwrap();

    let impact = docledger::models::ImpactSet {
        files: ["a.py".to_string()].into_iter().collect(),
        truncated: false,
    };
    let invalidated = manager.apply_impact(&impact).await.unwrap();
    assert!(invalidated.contains(&DocType::Readme));

    let history = manager.history(&DocType::Readme).await.unwrap();
    assert_eq!(history[0].status, ArtifactStatus::Stale);
}

#[tokio::test]
async fn test_deletion_invalidates_artifact() {
    let (_dir, pool) = setup().await;
    let ledger = FileLedger::new(pool.clone());
    ledger.record_scan("a.py", "a", "python").await.unwrap();
    ledger.record_scan("b.py", "b", "python").await.unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let manager = make_manager(
        &pool,
        Arc::new(CountingGenerator {
            calls: calls.clone(),
        }),
    );
    let v1 = manager.get_or_generate(&DocType::Readme).await.unwrap();

    // b.py disappears. It leaves the contributing set at that moment, so
    // only the fingerprint still remembers it contributed to v1.
    let scanned: HashSet<String> = ["a.py".to_string()].into_iter().collect();
    let deletions = ledger.detect_deletions(&scanned).await.unwrap();
    assert_eq!(deletions.len(), 1);

    let changed: HashSet<String> = deletions.iter().map(|c| c.path.clone()).collect();
    let impact = ledger.compute_impact(&changed, None).await.unwrap();

    let invalidated = manager.apply_impact(&impact).await.unwrap();
    assert!(invalidated.contains(&DocType::Readme));

    let history = manager.history(&DocType::Readme).await.unwrap();
    assert_eq!(history[0].status, ArtifactStatus::Stale);

    // The next request regenerates against the shrunken set.
    let v2 = manager.get_or_generate(&DocType::Readme).await.unwrap();
    assert_eq!(v2.version, 2);
    assert_ne!(v2.fingerprint, v1.fingerprint);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

// ---------- feedback ----------

#[tokio::test]
async fn test_feedback_record_and_summary() {
    let (_dir, pool) = setup().await;
    let ledger = FileLedger::new(pool.clone());
    ledger.record_scan("a.py", "v1", "python").await.unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let manager = make_manager(
        &pool,
        Arc::new(CountingGenerator {
            calls: calls.clone(),
        }),
    );
    let artifact = manager.get_or_generate(&DocType::Readme).await.unwrap();

    let sink = SqliteFeedback::new(pool.clone());
    sink.record(artifact.id, Some(4), Some("solid overview"), None)
        .await
        .unwrap();
    sink.record(artifact.id, Some(2), None, Some("setup section is wrong"))
        .await
        .unwrap();

    let summary = sink.summary(Some(&DocType::Readme)).await.unwrap();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.corrections, 1);
    assert!((summary.avg_rating.unwrap() - 3.0).abs() < 1e-9);

    // Out-of-range ratings and unknown artifacts are rejected.
    let err = sink.record(artifact.id, Some(9), None, None).await.unwrap_err();
    assert!(matches!(err, CoreError::Input(_)));
    let err = sink.record(99999, Some(3), None, None).await.unwrap_err();
    assert!(matches!(err, CoreError::Input(_)));
}
