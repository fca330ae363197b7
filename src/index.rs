//! Chunk-level vector similarity index.
//!
//! Vectors are stored as little-endian f32 BLOBs in SQLite and scored with
//! brute-force cosine similarity. Removals are lazy: vectors of changed or
//! deleted files are tombstoned and skipped by search, then physically
//! reclaimed by [`VectorIndex::compact_if_needed`] once the tombstone ratio
//! crosses the configured threshold.
//!
//! Dimensionality is fixed by the first inserted vector and recorded in
//! `index_meta`; later mismatches are input errors, never silent drops.

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob, EmbeddingProvider};
use crate::error::{CoreError, CoreResult};
use crate::models::{CodeChunk, SearchHit};

const DIMS_META_KEY: &str = "dims";

/// Aggregate counters for `dlg status`.
#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    pub live: i64,
    pub tombstoned: i64,
    pub by_language: HashMap<String, i64>,
}

#[derive(Clone)]
pub struct VectorIndex {
    pool: SqlitePool,
    provider: Arc<dyn EmbeddingProvider>,
    compact_ratio: f64,
}

impl VectorIndex {
    pub fn new(pool: SqlitePool, provider: Arc<dyn EmbeddingProvider>, compact_ratio: f64) -> Self {
        Self {
            pool,
            provider,
            compact_ratio,
        }
    }

    /// Add or refresh a chunk in the index.
    ///
    /// Re-adding a chunk whose text hash is unchanged and whose vector is
    /// still live is a no-op, so re-scans never re-embed unchanged content.
    /// Returns `true` when a new embedding was produced.
    pub async fn add_chunk(&self, chunk: &CodeChunk) -> CoreResult<bool> {
        let existing = sqlx::query(
            "SELECT c.hash, c.embedded, v.tombstoned \
             FROM chunks c LEFT JOIN chunk_vectors v ON v.chunk_id = c.id \
             WHERE c.id = ?",
        )
        .bind(&chunk.id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = &existing {
            let hash: String = row.get("hash");
            let embedded: i64 = row.get("embedded");
            let tombstoned: Option<i64> = row.get("tombstoned");
            if hash == chunk.hash && embedded != 0 && tombstoned == Some(0) {
                return Ok(false);
            }
        }

        sqlx::query(
            "INSERT INTO chunks (id, path, name, start_line, end_line, language, text, hash, embedded) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0) \
             ON CONFLICT(id) DO UPDATE SET \
               path = excluded.path, name = excluded.name, start_line = excluded.start_line, \
               end_line = excluded.end_line, language = excluded.language, \
               text = excluded.text, hash = excluded.hash, embedded = 0",
        )
        .bind(&chunk.id)
        .bind(&chunk.path)
        .bind(&chunk.name)
        .bind(chunk.start_line)
        .bind(chunk.end_line)
        .bind(&chunk.language)
        .bind(&chunk.text)
        .bind(&chunk.hash)
        .execute(&self.pool)
        .await?;

        let vectors = self.provider.embed(&[chunk.text.clone()]).await?;
        let vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::Provider("empty embedding response".to_string()))?;

        self.check_dims(vector.len()).await?;

        sqlx::query(
            "INSERT INTO chunk_vectors (chunk_id, path, embedding, tombstoned) VALUES (?, ?, ?, 0) \
             ON CONFLICT(chunk_id) DO UPDATE SET \
               path = excluded.path, embedding = excluded.embedding, tombstoned = 0",
        )
        .bind(&chunk.id)
        .bind(&chunk.path)
        .bind(vec_to_blob(&vector))
        .execute(&self.pool)
        .await?;

        sqlx::query("UPDATE chunks SET embedded = 1 WHERE id = ?")
            .bind(&chunk.id)
            .execute(&self.pool)
            .await?;

        Ok(true)
    }

    /// Embed every stored chunk that has no live vector, in provider
    /// batches of `batch_size`.
    ///
    /// This is the recovery path for chunks left at `embedded = 0` by an
    /// earlier provider outage: their files may be unchanged on the next
    /// scan, so the per-file path never revisits them. Provider failures
    /// stay non-fatal here too; whatever could not be embedded is reported
    /// as still pending. Returns `(embedded, pending)`.
    pub async fn embed_pending(&self, batch_size: usize) -> CoreResult<(u64, u64)> {
        let rows = sqlx::query(
            "SELECT c.id, c.path, c.text FROM chunks c \
             LEFT JOIN chunk_vectors v ON v.chunk_id = c.id \
             WHERE c.embedded = 0 OR v.chunk_id IS NULL OR v.tombstoned = 1 \
             ORDER BY c.id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut embedded = 0u64;
        let mut pending = rows.len() as u64;

        for batch in rows.chunks(batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|r| r.get("text")).collect();
            let vectors = match self.provider.embed(&texts).await {
                Ok(vectors) => vectors,
                Err(CoreError::Provider(e)) => {
                    warn!(error = %e, remaining = pending, "embedding backfill interrupted");
                    break;
                }
                Err(e) => return Err(e),
            };
            if vectors.len() != batch.len() {
                return Err(CoreError::Provider(format!(
                    "provider returned {} embeddings for {} texts",
                    vectors.len(),
                    batch.len()
                )));
            }

            for (row, vector) in batch.iter().zip(vectors) {
                self.check_dims(vector.len()).await?;

                let chunk_id: String = row.get("id");
                sqlx::query(
                    "INSERT INTO chunk_vectors (chunk_id, path, embedding, tombstoned) VALUES (?, ?, ?, 0) \
                     ON CONFLICT(chunk_id) DO UPDATE SET \
                       path = excluded.path, embedding = excluded.embedding, tombstoned = 0",
                )
                .bind(&chunk_id)
                .bind(row.get::<String, _>("path"))
                .bind(vec_to_blob(&vector))
                .execute(&self.pool)
                .await?;

                sqlx::query("UPDATE chunks SET embedded = 1 WHERE id = ?")
                    .bind(&chunk_id)
                    .execute(&self.pool)
                    .await?;

                embedded += 1;
                pending -= 1;
            }
        }

        Ok((embedded, pending))
    }

    /// Tombstone all vectors of a file and drop its chunk rows.
    ///
    /// Returns the number of vectors newly tombstoned.
    pub async fn remove_chunks_of_file(&self, path: &str) -> CoreResult<u64> {
        let tombstoned = sqlx::query(
            "UPDATE chunk_vectors SET tombstoned = 1 WHERE path = ? AND tombstoned = 0",
        )
        .bind(path)
        .execute(&self.pool)
        .await?
        .rows_affected();

        sqlx::query("DELETE FROM chunks WHERE path = ?")
            .bind(path)
            .execute(&self.pool)
            .await?;

        Ok(tombstoned)
    }

    /// Search for the `top_k` most similar live chunks.
    ///
    /// Scores are cosine similarity, sorted descending with ties broken by
    /// ascending chunk id, so results are deterministic. Asking for more
    /// results than live vectors returns everything.
    pub async fn search(&self, query: &str, top_k: usize) -> CoreResult<Vec<SearchHit>> {
        let vectors = self.provider.embed(&[query.to_string()]).await?;
        let query_vec = vectors
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::Provider("empty embedding response".to_string()))?;

        if let Some(dims) = self.stored_dims().await? {
            if query_vec.len() != dims {
                return Err(CoreError::Input(format!(
                    "query embedding has {} dims, index expects {}",
                    query_vec.len(),
                    dims
                )));
            }
        }

        let rows = sqlx::query(
            "SELECT c.id, c.path, c.name, c.start_line, c.end_line, c.language, c.text, v.embedding \
             FROM chunk_vectors v JOIN chunks c ON c.id = v.chunk_id \
             WHERE v.tombstoned = 0",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut hits: Vec<SearchHit> = rows
            .into_iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let score = cosine_similarity(&query_vec, &blob_to_vec(&blob));
                SearchHit {
                    chunk_id: row.get("id"),
                    path: row.get("path"),
                    name: row.get("name"),
                    start_line: row.get("start_line"),
                    end_line: row.get("end_line"),
                    language: row.get("language"),
                    text: row.get("text"),
                    score,
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        hits.truncate(top_k);

        Ok(hits)
    }

    /// Fraction of stored vectors that are tombstoned. Zero when empty.
    pub async fn tombstone_ratio(&self) -> CoreResult<f64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total, SUM(tombstoned) AS dead FROM chunk_vectors",
        )
        .fetch_one(&self.pool)
        .await?;

        let total: i64 = row.get("total");
        if total == 0 {
            return Ok(0.0);
        }
        let dead: Option<i64> = row.get("dead");
        Ok(dead.unwrap_or(0) as f64 / total as f64)
    }

    /// Physically delete tombstoned vectors once the ratio crosses the
    /// configured threshold. Returns whether compaction ran.
    pub async fn compact_if_needed(&self) -> CoreResult<bool> {
        let ratio = self.tombstone_ratio().await?;
        if ratio <= self.compact_ratio {
            return Ok(false);
        }

        let removed = sqlx::query("DELETE FROM chunk_vectors WHERE tombstoned = 1")
            .execute(&self.pool)
            .await?
            .rows_affected();

        info!(removed, ratio, "compacted vector index");
        Ok(true)
    }

    pub async fn stats(&self) -> CoreResult<IndexStats> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total, COALESCE(SUM(tombstoned), 0) AS dead FROM chunk_vectors",
        )
        .fetch_one(&self.pool)
        .await?;
        let total: i64 = row.get("total");
        let dead: i64 = row.get("dead");

        let lang_rows = sqlx::query(
            "SELECT c.language, COUNT(*) AS n \
             FROM chunk_vectors v JOIN chunks c ON c.id = v.chunk_id \
             WHERE v.tombstoned = 0 GROUP BY c.language",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_language = HashMap::new();
        for row in lang_rows {
            by_language.insert(row.get("language"), row.get("n"));
        }

        Ok(IndexStats {
            live: total - dead,
            tombstoned: dead,
            by_language,
        })
    }

    async fn stored_dims(&self) -> CoreResult<Option<usize>> {
        let row = sqlx::query("SELECT value FROM index_meta WHERE key = ?")
            .bind(DIMS_META_KEY)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => {
                let value: String = r.get("value");
                let dims = value
                    .parse::<usize>()
                    .map_err(|_| CoreError::Store(format!("corrupt dims metadata: {}", value)))?;
                Ok(Some(dims))
            }
            None => Ok(None),
        }
    }

    /// The first inserted vector fixes the index dimensionality.
    async fn check_dims(&self, dims: usize) -> CoreResult<()> {
        match self.stored_dims().await? {
            Some(stored) if stored != dims => Err(CoreError::Input(format!(
                "embedding has {} dims, index expects {}",
                dims, stored
            ))),
            Some(_) => Ok(()),
            None => {
                sqlx::query("INSERT OR REPLACE INTO index_meta (key, value) VALUES (?, ?)")
                    .bind(DIMS_META_KEY)
                    .bind(dims.to_string())
                    .execute(&self.pool)
                    .await?;
                Ok(())
            }
        }
    }
}
