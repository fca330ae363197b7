//! Idempotent schema creation for the ledger store.
//!
//! All tables use `CREATE TABLE IF NOT EXISTS`, so `dlg init` can be run
//! any number of times. The `changes` table is append-only by convention:
//! nothing in the crate ever updates or deletes its rows.

use sqlx::SqlitePool;

use crate::error::CoreResult;

pub async fn run_migrations(pool: &SqlitePool) -> CoreResult<()> {
    // File ledger: one row per path ever seen; deletions are tombstones.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS files (
            path TEXT PRIMARY KEY,
            content_hash TEXT NOT NULL,
            language TEXT NOT NULL,
            size INTEGER NOT NULL,
            last_seen_at INTEGER NOT NULL,
            deleted INTEGER NOT NULL DEFAULT 0,
            version INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Directed dependency edges; same pair with different kinds is distinct.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dependency_edges (
            from_path TEXT NOT NULL,
            to_path TEXT NOT NULL,
            kind TEXT NOT NULL,
            PRIMARY KEY (from_path, to_path, kind)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            path TEXT NOT NULL,
            name TEXT NOT NULL,
            start_line INTEGER NOT NULL,
            end_line INTEGER NOT NULL,
            language TEXT NOT NULL,
            text TEXT NOT NULL,
            hash TEXT NOT NULL,
            embedded INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Embedding vectors; `tombstoned` rows are skipped by search and
    // reclaimed by compaction.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunk_vectors (
            chunk_id TEXT PRIMARY KEY,
            path TEXT NOT NULL,
            embedding BLOB NOT NULL,
            tombstoned INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Index metadata, e.g. the dimensionality fixed at first insertion.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Append-only change audit trail.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS changes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            path TEXT NOT NULL,
            change_type TEXT NOT NULL,
            old_hash TEXT,
            new_hash TEXT,
            detected_at INTEGER NOT NULL,
            origin TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Documentation artifact versions; superseded rows are never deleted.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS artifacts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            doc_type TEXT NOT NULL,
            version INTEGER NOT NULL,
            content TEXT NOT NULL,
            generated_at INTEGER NOT NULL,
            fingerprint TEXT NOT NULL,
            status TEXT NOT NULL,
            UNIQUE(doc_type, version)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS feedback (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            artifact_id INTEGER NOT NULL,
            rating INTEGER,
            comment TEXT,
            correction TEXT,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (artifact_id) REFERENCES artifacts(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_path ON chunks(path)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_vectors_path ON chunk_vectors(path)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_edges_to ON dependency_edges(to_path)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_changes_detected ON changes(detected_at DESC)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_artifacts_type ON artifacts(doc_type, status)")
        .execute(pool)
        .await?;

    Ok(())
}
