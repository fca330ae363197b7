//! Artifact invalidation and deduplicated regeneration.
//!
//! [`InvalidationManager`] decides whether a documentation artifact is still
//! valid and regenerates it when it is not. Validity is a fingerprint
//! comparison: an artifact generated from the exact `(path, hash)` pairs
//! currently in its contributing set is fresh, anything else needs work.
//!
//! Concurrent requests for the same doc type are collapsed onto one
//! generation: the first caller spawns the work on the runtime and later
//! callers subscribe to its outcome over a watch channel. The spawned task
//! outlives any individual caller, so an abandoned request never cancels
//! work others are waiting on.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info};

use crate::config::DocsConfig;
use crate::error::{CoreError, CoreResult};
use crate::generator::DocumentGenerator;
use crate::index::VectorIndex;
use crate::ledger::{fingerprint, FileLedger};
use crate::models::{ArtifactStatus, DocType, DocumentationArtifact, ImpactSet};

const COMMIT_MAX_ATTEMPTS: u32 = 3;

/// The configured doc types and their contributing-set selectors.
pub struct DocCatalog {
    selectors: HashMap<DocType, Vec<String>>,
}

impl DocCatalog {
    pub fn from_config(config: &DocsConfig) -> CoreResult<Self> {
        let mut selectors = HashMap::new();
        for entry in &config.types {
            let doc_type = DocType::parse(&entry.name)
                .ok_or_else(|| CoreError::Input(format!("unknown doc type: {}", entry.name)))?;
            selectors.insert(doc_type, entry.include_globs.clone());
        }
        Ok(Self { selectors })
    }

    pub fn doc_types(&self) -> impl Iterator<Item = &DocType> {
        self.selectors.keys()
    }

    fn selector(&self, doc_type: &DocType) -> CoreResult<&[String]> {
        self.selectors
            .get(doc_type)
            .map(|globs| globs.as_slice())
            .ok_or_else(|| {
                CoreError::Input(format!("doc type not configured: {}", doc_type))
            })
    }
}

type GenerationOutcome = Option<Result<DocumentationArtifact, CoreError>>;

struct Inner {
    pool: SqlitePool,
    ledger: FileLedger,
    index: VectorIndex,
    generator: Arc<dyn DocumentGenerator>,
    catalog: DocCatalog,
    retrieval_top_k: usize,
    inflight: Mutex<HashMap<String, watch::Receiver<GenerationOutcome>>>,
}

#[derive(Clone)]
pub struct InvalidationManager {
    inner: Arc<Inner>,
}

impl InvalidationManager {
    pub fn new(
        pool: SqlitePool,
        ledger: FileLedger,
        index: VectorIndex,
        generator: Arc<dyn DocumentGenerator>,
        catalog: DocCatalog,
        retrieval_top_k: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                pool,
                ledger,
                index,
                generator,
                catalog,
                retrieval_top_k,
                inflight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Return a valid artifact for `doc_type`, regenerating if needed.
    ///
    /// Fresh with a matching fingerprint → returned as-is, no generator
    /// call. Otherwise exactly one generation runs per doc type at a time;
    /// concurrent callers all receive the same outcome.
    pub async fn get_or_generate(&self, doc_type: &DocType) -> CoreResult<DocumentationArtifact> {
        self.inner.catalog.selector(doc_type)?;

        if let Some(artifact) = self.valid_artifact(doc_type).await? {
            return Ok(artifact);
        }

        let key = doc_type.to_string();
        let mut rx = {
            let mut inflight = self.inner.inflight.lock().await;
            match inflight.get(&key) {
                Some(rx) => rx.clone(),
                None => {
                    let (tx, rx) = watch::channel(None);
                    inflight.insert(key.clone(), rx.clone());

                    let manager = self.clone();
                    let doc_type = doc_type.clone();
                    tokio::spawn(async move {
                        let outcome = manager.generate_once(&doc_type).await;
                        manager
                            .inner
                            .inflight
                            .lock()
                            .await
                            .remove(&doc_type.to_string());
                        let _ = tx.send(Some(outcome));
                    });

                    rx
                }
            }
        };

        loop {
            if let Some(outcome) = rx.borrow_and_update().clone() {
                return outcome;
            }
            if rx.changed().await.is_err() {
                return Err(CoreError::Generation(
                    "generation task aborted".to_string(),
                ));
            }
        }
    }

    /// Whether an impact set invalidates `doc_type`.
    ///
    /// No fresh artifact → trivially yes. Otherwise yes when the impact
    /// intersects the doc type's contributing set, or when the fresh
    /// artifact's fingerprint no longer matches the current one. The
    /// fingerprint check catches departures the intersection cannot see:
    /// a deleted file has already left the contributing set, so it never
    /// intersects, yet the artifact was generated from it.
    pub async fn should_invalidate(
        &self,
        doc_type: &DocType,
        impact: &ImpactSet,
    ) -> CoreResult<bool> {
        let selector = self.inner.catalog.selector(doc_type)?;

        let Some(artifact) = self.latest_fresh(doc_type).await? else {
            return Ok(true);
        };

        if artifact.fingerprint != self.current_fingerprint(doc_type).await? {
            return Ok(true);
        }

        let contributing = self.inner.ledger.contributing_set(selector).await?;
        Ok(contributing
            .iter()
            .any(|(path, _)| impact.files.contains(path)))
    }

    /// Mark fresh artifacts whose doc type the impact set touches as stale.
    ///
    /// Returns the doc types downgraded. Stale artifacts remain readable
    /// via [`InvalidationManager::history`]; the next
    /// [`InvalidationManager::get_or_generate`] replaces them.
    pub async fn apply_impact(&self, impact: &ImpactSet) -> CoreResult<Vec<DocType>> {
        let doc_types: Vec<DocType> = self.inner.catalog.doc_types().cloned().collect();
        let mut invalidated = Vec::new();

        for doc_type in doc_types {
            if self.latest_fresh(&doc_type).await?.is_none() {
                continue;
            }
            if self.should_invalidate(&doc_type, impact).await? {
                sqlx::query(
                    "UPDATE artifacts SET status = 'stale' WHERE doc_type = ? AND status = 'fresh'",
                )
                .bind(doc_type.to_string())
                .execute(&self.inner.pool)
                .await?;
                info!(doc_type = %doc_type, "artifact invalidated by change impact");
                invalidated.push(doc_type);
            }
        }

        Ok(invalidated)
    }

    /// Fingerprint of the doc type's current contributing set.
    pub async fn current_fingerprint(&self, doc_type: &DocType) -> CoreResult<String> {
        let selector = self.inner.catalog.selector(doc_type)?;
        let pairs = self.inner.ledger.contributing_set(selector).await?;
        Ok(fingerprint(&pairs))
    }

    /// Latest fresh artifact for a doc type, if any.
    pub async fn latest_fresh(&self, doc_type: &DocType) -> CoreResult<Option<DocumentationArtifact>> {
        let row = sqlx::query(
            "SELECT id, doc_type, version, content, generated_at, fingerprint, status \
             FROM artifacts WHERE doc_type = ? AND status = 'fresh' \
             ORDER BY version DESC LIMIT 1",
        )
        .bind(doc_type.to_string())
        .fetch_optional(&self.inner.pool)
        .await?;

        row.map(row_to_artifact).transpose()
    }

    /// Full version history of a doc type, newest first.
    pub async fn history(&self, doc_type: &DocType) -> CoreResult<Vec<DocumentationArtifact>> {
        let rows = sqlx::query(
            "SELECT id, doc_type, version, content, generated_at, fingerprint, status \
             FROM artifacts WHERE doc_type = ? ORDER BY version DESC",
        )
        .bind(doc_type.to_string())
        .fetch_all(&self.inner.pool)
        .await?;

        rows.into_iter().map(row_to_artifact).collect()
    }

    async fn valid_artifact(&self, doc_type: &DocType) -> CoreResult<Option<DocumentationArtifact>> {
        match self.latest_fresh(doc_type).await? {
            Some(artifact) => {
                let current = self.current_fingerprint(doc_type).await?;
                if artifact.fingerprint == current {
                    Ok(Some(artifact))
                } else {
                    debug!(doc_type = %doc_type, "fresh artifact has stale fingerprint");
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }

    /// One full regeneration: retrieve context, generate, commit.
    ///
    /// Re-checks validity first, so a caller that raced past the hot path
    /// after another generation finished does not regenerate again. Nothing
    /// is committed when retrieval or generation fails; the previous
    /// artifact keeps its status.
    async fn generate_once(&self, doc_type: &DocType) -> CoreResult<DocumentationArtifact> {
        if let Some(artifact) = self.valid_artifact(doc_type).await? {
            return Ok(artifact);
        }

        let fp = self.current_fingerprint(doc_type).await?;

        let query = format!("main functionality for {} documentation", doc_type);
        let context = self
            .inner
            .index
            .search(&query, self.inner.retrieval_top_k)
            .await?;

        let content = self.inner.generator.generate(doc_type, &context).await?;

        self.commit_artifact(doc_type, &content, &fp).await
    }

    /// Supersede the previous fresh version and insert the new one in a
    /// single transaction. A lost version race is retried with a recomputed
    /// version number rather than forced through.
    async fn commit_artifact(
        &self,
        doc_type: &DocType,
        content: &str,
        fp: &str,
    ) -> CoreResult<DocumentationArtifact> {
        let now = Utc::now().timestamp();

        for _ in 0..COMMIT_MAX_ATTEMPTS {
            let mut tx = self.inner.pool.begin().await?;

            sqlx::query(
                "UPDATE artifacts SET status = 'superseded' \
                 WHERE doc_type = ? AND status IN ('fresh', 'stale')",
            )
            .bind(doc_type.to_string())
            .execute(&mut *tx)
            .await?;

            let row = sqlx::query(
                "SELECT COALESCE(MAX(version), 0) AS v FROM artifacts WHERE doc_type = ?",
            )
            .bind(doc_type.to_string())
            .fetch_one(&mut *tx)
            .await?;
            let version: i64 = row.get::<i64, _>("v") + 1;

            let insert = sqlx::query(
                "INSERT INTO artifacts (doc_type, version, content, generated_at, fingerprint, status) \
                 VALUES (?, ?, ?, ?, ?, 'fresh')",
            )
            .bind(doc_type.to_string())
            .bind(version)
            .bind(content)
            .bind(now)
            .bind(fp)
            .execute(&mut *tx)
            .await;

            match insert {
                Ok(result) => {
                    let id = result.last_insert_rowid();
                    tx.commit().await?;
                    info!(doc_type = %doc_type, version, "committed documentation artifact");
                    return Ok(DocumentationArtifact {
                        id,
                        doc_type: doc_type.clone(),
                        version,
                        content: content.to_string(),
                        generated_at: now,
                        fingerprint: fp.to_string(),
                        status: ArtifactStatus::Fresh,
                    });
                }
                Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                    // Another committer took this version number.
                    tx.rollback().await?;
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(CoreError::Consistency(format!(
            "concurrent artifact commits for {} exceeded retry budget",
            doc_type
        )))
    }
}

fn row_to_artifact(row: sqlx::sqlite::SqliteRow) -> CoreResult<DocumentationArtifact> {
    let type_str: String = row.get("doc_type");
    let doc_type = DocType::parse(&type_str)
        .ok_or_else(|| CoreError::Store(format!("unknown doc type in store: {}", type_str)))?;
    let status_str: String = row.get("status");
    let status = ArtifactStatus::parse(&status_str)
        .ok_or_else(|| CoreError::Store(format!("unknown artifact status: {}", status_str)))?;

    Ok(DocumentationArtifact {
        id: row.get("id"),
        doc_type,
        version: row.get("version"),
        content: row.get("content"),
        generated_at: row.get("generated_at"),
        fingerprint: row.get("fingerprint"),
        status,
    })
}
