//! Content-addressed file ledger and dependency graph.
//!
//! The ledger is the source of truth for what the repository looked like
//! the last time it was scanned: one row per path with its SHA-256 content
//! hash, a tombstone flag for deletions, and an append-only `changes` audit
//! trail. Concurrent scanners are serialized per row by an optimistic
//! version check rather than a global lock.
//!
//! The dependency graph lives alongside the ledger and powers
//! [`FileLedger::compute_impact`], the reverse-closure query invalidation
//! is built on.

use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet, VecDeque};

use chrono::Utc;
use globset::{Glob, GlobSetBuilder};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::models::{
    ChangeOrigin, ChangeRecord, ChangeType, DependencyEdge, EdgeKind, FileRecord, ImpactSet,
    VcsChange,
};

const CAS_MAX_ATTEMPTS: u32 = 3;

/// Compute the SHA-256 hex digest of file content.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Order-independent digest of a contributing set.
///
/// Pairs are sorted by path before hashing, so the fingerprint depends only
/// on which `(path, hash)` pairs are present, never on scan order.
pub fn fingerprint(pairs: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = pairs.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = Sha256::new();
    for (path, hash) in sorted {
        hasher.update(path.as_bytes());
        hasher.update([0u8]);
        hasher.update(hash.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

/// Pure reverse-dependency closure over an in-memory adjacency map.
///
/// `reverse` maps a path to the files that depend on it. Seeds are always
/// included in the result. BFS with a visited set, so cycles terminate.
/// When `max_depth` stops the walk while unvisited dependents remain, the
/// result is flagged `truncated` instead of failing.
pub(crate) fn reverse_closure(
    reverse: &HashMap<String, Vec<String>>,
    seeds: &HashSet<String>,
    max_depth: Option<usize>,
) -> ImpactSet {
    let mut files: HashSet<String> = seeds.clone();
    let mut queue: VecDeque<(String, usize)> = seeds.iter().map(|s| (s.clone(), 0)).collect();
    let mut truncated = false;

    while let Some((path, depth)) = queue.pop_front() {
        if let Some(dependents) = reverse.get(&path) {
            for dependent in dependents {
                if files.contains(dependent) {
                    continue;
                }
                if let Some(cap) = max_depth {
                    if depth >= cap {
                        truncated = true;
                        continue;
                    }
                }
                files.insert(dependent.clone());
                queue.push_back((dependent.clone(), depth + 1));
            }
        }
    }

    ImpactSet { files, truncated }
}

/// SQLite-backed file ledger.
#[derive(Clone)]
pub struct FileLedger {
    pool: SqlitePool,
}

impl FileLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a scanned file, returning the change it produced (if any).
    ///
    /// - unknown path → insert, `Added`
    /// - known path, same hash → touch `last_seen_at`, no change
    /// - known path, different hash → update, `Modified` with old and new hash
    /// - previously deleted path → reactivate as a fresh `Added`
    ///
    /// Updates use an optimistic check on the row version; a lost race is
    /// retried a bounded number of times before surfacing as a
    /// [`CoreError::Consistency`].
    pub async fn record_scan(
        &self,
        path: &str,
        content: &str,
        language: &str,
    ) -> CoreResult<Option<ChangeRecord>> {
        validate_path(path)?;

        let new_hash = hash_content(content);
        let size = content.len() as i64;
        let now = Utc::now().timestamp();

        for _ in 0..CAS_MAX_ATTEMPTS {
            let existing = self.get_file(path).await?;

            match existing {
                None => {
                    let inserted = sqlx::query(
                        "INSERT OR IGNORE INTO files (path, content_hash, language, size, last_seen_at, deleted, version) \
                         VALUES (?, ?, ?, ?, ?, 0, 1)",
                    )
                    .bind(path)
                    .bind(&new_hash)
                    .bind(language)
                    .bind(size)
                    .bind(now)
                    .execute(&self.pool)
                    .await?;

                    if inserted.rows_affected() == 0 {
                        // Another scanner inserted first; re-read and retry.
                        continue;
                    }

                    let change = ChangeRecord {
                        path: path.to_string(),
                        change_type: ChangeType::Added,
                        old_hash: None,
                        new_hash: Some(new_hash.clone()),
                        detected_at: now,
                        origin: ChangeOrigin::Hash,
                    };
                    self.append_change(&change).await?;
                    return Ok(Some(change));
                }
                Some(record) if record.deleted => {
                    // Reappearance after deletion is a fresh add, not a
                    // resurrection of the old identity.
                    let updated = sqlx::query(
                        "UPDATE files SET content_hash = ?, language = ?, size = ?, last_seen_at = ?, \
                         deleted = 0, version = version + 1 WHERE path = ? AND version = ?",
                    )
                    .bind(&new_hash)
                    .bind(language)
                    .bind(size)
                    .bind(now)
                    .bind(path)
                    .bind(record.version)
                    .execute(&self.pool)
                    .await?;

                    if updated.rows_affected() == 0 {
                        continue;
                    }

                    let change = ChangeRecord {
                        path: path.to_string(),
                        change_type: ChangeType::Added,
                        old_hash: None,
                        new_hash: Some(new_hash.clone()),
                        detected_at: now,
                        origin: ChangeOrigin::Hash,
                    };
                    self.append_change(&change).await?;
                    return Ok(Some(change));
                }
                Some(record) if record.content_hash == new_hash => {
                    sqlx::query("UPDATE files SET last_seen_at = ? WHERE path = ?")
                        .bind(now)
                        .bind(path)
                        .execute(&self.pool)
                        .await?;
                    return Ok(None);
                }
                Some(record) => {
                    let updated = sqlx::query(
                        "UPDATE files SET content_hash = ?, language = ?, size = ?, last_seen_at = ?, \
                         version = version + 1 WHERE path = ? AND version = ?",
                    )
                    .bind(&new_hash)
                    .bind(language)
                    .bind(size)
                    .bind(now)
                    .bind(path)
                    .bind(record.version)
                    .execute(&self.pool)
                    .await?;

                    if updated.rows_affected() == 0 {
                        continue;
                    }

                    let change = ChangeRecord {
                        path: path.to_string(),
                        change_type: ChangeType::Modified,
                        old_hash: Some(record.content_hash),
                        new_hash: Some(new_hash.clone()),
                        detected_at: now,
                        origin: ChangeOrigin::Hash,
                    };
                    self.append_change(&change).await?;
                    return Ok(Some(change));
                }
            }
        }

        Err(CoreError::Consistency(format!(
            "concurrent updates to '{}' exceeded retry budget",
            path
        )))
    }

    /// Mark tracked files absent from `scanned` as deleted.
    ///
    /// Returns one `Deleted` change per newly tombstoned file. Already
    /// deleted files produce nothing.
    pub async fn detect_deletions(
        &self,
        scanned: &HashSet<String>,
    ) -> CoreResult<Vec<ChangeRecord>> {
        let rows = sqlx::query("SELECT path, content_hash FROM files WHERE deleted = 0")
            .fetch_all(&self.pool)
            .await?;

        let now = Utc::now().timestamp();
        let mut changes = Vec::new();

        for row in rows {
            let path: String = row.get("path");
            if scanned.contains(&path) {
                continue;
            }
            let old_hash: String = row.get("content_hash");

            sqlx::query(
                "UPDATE files SET deleted = 1, last_seen_at = ?, version = version + 1 WHERE path = ?",
            )
            .bind(now)
            .bind(&path)
            .execute(&self.pool)
            .await?;

            let change = ChangeRecord {
                path,
                change_type: ChangeType::Deleted,
                old_hash: Some(old_hash),
                new_hash: None,
                detected_at: now,
                origin: ChangeOrigin::Hash,
            };
            self.append_change(&change).await?;
            changes.push(change);
        }

        Ok(changes)
    }

    /// Reconcile a version-control report against hash observations.
    ///
    /// Hash comparison is ground truth: a VCS-reported change with no hash
    /// difference is dropped, and a hash-observed change the VCS missed is
    /// kept. Disagreements are logged at debug level for audit.
    pub async fn reconcile_with_source(
        &self,
        vcs_changes: &[VcsChange],
        hash_changes: &[ChangeRecord],
    ) -> CoreResult<Vec<ChangeRecord>> {
        let by_path: HashSet<&str> = hash_changes.iter().map(|c| c.path.as_str()).collect();

        for vcs in vcs_changes {
            if !by_path.contains(vcs.path.as_str()) {
                debug!(
                    path = %vcs.path,
                    status = vcs.status.as_str(),
                    "vcs reported change but content hash is unchanged; ignoring"
                );
            }
        }
        for change in hash_changes {
            if !vcs_changes.iter().any(|v| v.path == change.path) {
                debug!(
                    path = %change.path,
                    change_type = change.change_type.as_str(),
                    "content change not reported by vcs"
                );
            }
        }

        Ok(hash_changes.to_vec())
    }

    pub async fn get_file(&self, path: &str) -> CoreResult<Option<FileRecord>> {
        let row = sqlx::query(
            "SELECT path, content_hash, language, size, last_seen_at, deleted, version \
             FROM files WHERE path = ?",
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| FileRecord {
            path: r.get("path"),
            content_hash: r.get("content_hash"),
            language: r.get("language"),
            size: r.get("size"),
            last_seen_at: r.get("last_seen_at"),
            deleted: r.get::<i64, _>("deleted") != 0,
            version: r.get("version"),
        }))
    }

    /// All live (non-deleted) tracked paths.
    pub async fn tracked_paths(&self) -> CoreResult<Vec<String>> {
        let rows = sqlx::query("SELECT path FROM files WHERE deleted = 0 ORDER BY path")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get("path")).collect())
    }

    /// Replace all outgoing dependency edges of a file in one transaction.
    pub async fn set_dependencies(
        &self,
        from_path: &str,
        edges: &[DependencyEdge],
    ) -> CoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM dependency_edges WHERE from_path = ?")
            .bind(from_path)
            .execute(&mut *tx)
            .await?;

        for edge in edges {
            sqlx::query(
                "INSERT OR IGNORE INTO dependency_edges (from_path, to_path, kind) VALUES (?, ?, ?)",
            )
            .bind(&edge.from)
            .bind(&edge.to)
            .bind(edge.kind.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn add_dependency(&self, edge: &DependencyEdge) -> CoreResult<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO dependency_edges (from_path, to_path, kind) VALUES (?, ?, ?)",
        )
        .bind(&edge.from)
        .bind(&edge.to)
        .bind(edge.kind.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn dependency_edges(&self) -> CoreResult<Vec<DependencyEdge>> {
        let rows = sqlx::query("SELECT from_path, to_path, kind FROM dependency_edges")
            .fetch_all(&self.pool)
            .await?;

        let mut edges = Vec::with_capacity(rows.len());
        for row in rows {
            let kind_str: String = row.get("kind");
            let kind = EdgeKind::parse(&kind_str)
                .ok_or_else(|| CoreError::Store(format!("unknown edge kind: {}", kind_str)))?;
            edges.push(DependencyEdge {
                from: row.get("from_path"),
                to: row.get("to_path"),
                kind,
            });
        }
        Ok(edges)
    }

    /// Compute the impact set of a change: the changed files plus every
    /// file that transitively depends on them.
    pub async fn compute_impact(
        &self,
        changed: &HashSet<String>,
        max_depth: Option<usize>,
    ) -> CoreResult<ImpactSet> {
        let edges = self.dependency_edges().await?;

        let mut reverse: HashMap<String, Vec<String>> = HashMap::new();
        for edge in edges {
            reverse.entry(edge.to).or_default().push(edge.from);
        }

        Ok(reverse_closure(&reverse, changed, max_depth))
    }

    /// The `(path, content_hash)` pairs contributing to a doc type.
    ///
    /// An empty selector means every live tracked file contributes.
    pub async fn contributing_set(
        &self,
        include_globs: &[String],
    ) -> CoreResult<Vec<(String, String)>> {
        let rows =
            sqlx::query("SELECT path, content_hash FROM files WHERE deleted = 0 ORDER BY path")
                .fetch_all(&self.pool)
                .await?;

        let matcher = if include_globs.is_empty() {
            None
        } else {
            let mut builder = GlobSetBuilder::new();
            for glob in include_globs {
                builder.add(
                    Glob::new(glob)
                        .map_err(|e| CoreError::Input(format!("invalid glob '{}': {}", glob, e)))?,
                );
            }
            Some(
                builder
                    .build()
                    .map_err(|e| CoreError::Input(e.to_string()))?,
            )
        };

        let mut pairs = Vec::new();
        for row in rows {
            let path: String = row.get("path");
            if matcher.as_ref().map_or(true, |m| m.is_match(&path)) {
                pairs.push((path, row.get("content_hash")));
            }
        }
        Ok(pairs)
    }

    /// Most recent entries from the change audit trail, newest first.
    pub async fn recent_changes(&self, limit: i64) -> CoreResult<Vec<ChangeRecord>> {
        let rows = sqlx::query(
            "SELECT path, change_type, old_hash, new_hash, detected_at, origin \
             FROM changes ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut changes = Vec::with_capacity(rows.len());
        for row in rows {
            let type_str: String = row.get("change_type");
            let change_type = ChangeType::parse(&type_str)
                .ok_or_else(|| CoreError::Store(format!("unknown change type: {}", type_str)))?;
            let origin_str: String = row.get("origin");
            let origin = match origin_str.as_str() {
                "vcs" => ChangeOrigin::Vcs,
                _ => ChangeOrigin::Hash,
            };
            changes.push(ChangeRecord {
                path: row.get("path"),
                change_type,
                old_hash: row.get("old_hash"),
                new_hash: row.get("new_hash"),
                detected_at: row.get("detected_at"),
                origin,
            });
        }
        Ok(changes)
    }

    async fn append_change(&self, change: &ChangeRecord) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO changes (path, change_type, old_hash, new_hash, detected_at, origin) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&change.path)
        .bind(change.change_type.as_str())
        .bind(&change.old_hash)
        .bind(&change.new_hash)
        .bind(change.detected_at)
        .bind(change.origin.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn validate_path(path: &str) -> CoreResult<()> {
    if path.is_empty() {
        return Err(CoreError::Input("file path must not be empty".to_string()));
    }
    if path.contains('\0') {
        return Err(CoreError::Input(format!(
            "file path contains NUL byte: {:?}",
            path
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &str)]) -> HashMap<String, Vec<String>> {
        // Key: depended-on path; value: its dependents.
        let mut reverse: HashMap<String, Vec<String>> = HashMap::new();
        for (from, to) in edges {
            reverse
                .entry(to.to_string())
                .or_default()
                .push(from.to_string());
        }
        reverse
    }

    fn seeds(paths: &[&str]) -> HashSet<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_fingerprint_order_independent() {
        let a = vec![
            ("a.py".to_string(), "h1".to_string()),
            ("b.py".to_string(), "h2".to_string()),
        ];
        let b = vec![
            ("b.py".to_string(), "h2".to_string()),
            ("a.py".to_string(), "h1".to_string()),
        ];
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_changes_with_hash() {
        let a = vec![("a.py".to_string(), "h1".to_string())];
        let b = vec![("a.py".to_string(), "h2".to_string())];
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_stable() {
        let pairs = vec![("a.py".to_string(), "h1".to_string())];
        assert_eq!(fingerprint(&pairs), fingerprint(&pairs));
    }

    #[test]
    fn test_reverse_closure_transitive() {
        // c depends on b, b depends on a; changing a impacts all three.
        let reverse = graph(&[("b", "a"), ("c", "b")]);
        let impact = reverse_closure(&reverse, &seeds(&["a"]), None);
        assert_eq!(impact.files, seeds(&["a", "b", "c"]));
        assert!(!impact.truncated);
    }

    #[test]
    fn test_reverse_closure_cycle_terminates() {
        let reverse = graph(&[("a", "b"), ("b", "a")]);
        let impact = reverse_closure(&reverse, &seeds(&["a"]), None);
        assert_eq!(impact.files, seeds(&["a", "b"]));
        assert!(!impact.truncated);
    }

    #[test]
    fn test_reverse_closure_depth_cap_truncates() {
        let reverse = graph(&[("b", "a"), ("c", "b"), ("d", "c")]);
        let impact = reverse_closure(&reverse, &seeds(&["a"]), Some(1));
        assert_eq!(impact.files, seeds(&["a", "b"]));
        assert!(impact.truncated);
    }

    #[test]
    fn test_reverse_closure_cap_not_hit() {
        let reverse = graph(&[("b", "a")]);
        let impact = reverse_closure(&reverse, &seeds(&["a"]), Some(5));
        assert_eq!(impact.files, seeds(&["a", "b"]));
        assert!(!impact.truncated);
    }

    #[test]
    fn test_reverse_closure_seeds_always_included() {
        let reverse = graph(&[]);
        let impact = reverse_closure(&reverse, &seeds(&["lonely.py"]), Some(0));
        assert_eq!(impact.files, seeds(&["lonely.py"]));
        assert!(!impact.truncated);
    }

    #[test]
    fn test_validate_path() {
        assert!(validate_path("src/a.py").is_ok());
        assert!(validate_path("").is_err());
        assert!(validate_path("bad\0path").is_err());
    }
}
