//! Feedback capture for generated artifacts.
//!
//! Readers can attach a rating, a free-form comment, or a proposed
//! correction to any artifact version, including superseded ones. Feedback
//! never mutates the artifact it targets; it is raw material for prompt
//! tuning and review.

use async_trait::async_trait;

use sqlx::{Row, SqlitePool};

use crate::error::{CoreError, CoreResult};
use crate::models::DocType;

#[async_trait]
pub trait FeedbackSink: Send + Sync {
    /// Record feedback against an artifact. `rating` is 1..=5 when present.
    async fn record(
        &self,
        artifact_id: i64,
        rating: Option<i64>,
        comment: Option<&str>,
        correction: Option<&str>,
    ) -> Result<(), CoreError>;
}

/// Aggregate view of collected feedback.
#[derive(Debug, Clone, Default)]
pub struct FeedbackSummary {
    pub total: i64,
    pub avg_rating: Option<f64>,
    pub corrections: i64,
}

#[derive(Clone)]
pub struct SqliteFeedback {
    pool: SqlitePool,
}

impl SqliteFeedback {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Summary over all feedback, or scoped to one doc type's artifacts.
    pub async fn summary(&self, doc_type: Option<&DocType>) -> CoreResult<FeedbackSummary> {
        let row = match doc_type {
            Some(dt) => {
                sqlx::query(
                    "SELECT COUNT(*) AS total, AVG(f.rating) AS avg_rating, \
                     SUM(CASE WHEN f.correction IS NOT NULL THEN 1 ELSE 0 END) AS corrections \
                     FROM feedback f JOIN artifacts a ON a.id = f.artifact_id \
                     WHERE a.doc_type = ?",
                )
                .bind(dt.to_string())
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT COUNT(*) AS total, AVG(rating) AS avg_rating, \
                     SUM(CASE WHEN correction IS NOT NULL THEN 1 ELSE 0 END) AS corrections \
                     FROM feedback",
                )
                .fetch_one(&self.pool)
                .await?
            }
        };

        let corrections: Option<i64> = row.get("corrections");
        Ok(FeedbackSummary {
            total: row.get("total"),
            avg_rating: row.get("avg_rating"),
            corrections: corrections.unwrap_or(0),
        })
    }
}

#[async_trait]
impl FeedbackSink for SqliteFeedback {
    async fn record(
        &self,
        artifact_id: i64,
        rating: Option<i64>,
        comment: Option<&str>,
        correction: Option<&str>,
    ) -> Result<(), CoreError> {
        if let Some(r) = rating {
            if !(1..=5).contains(&r) {
                return Err(CoreError::Input(format!(
                    "rating must be between 1 and 5, got {}",
                    r
                )));
            }
        }
        if rating.is_none() && comment.is_none() && correction.is_none() {
            return Err(CoreError::Input(
                "feedback needs a rating, comment, or correction".to_string(),
            ));
        }

        let exists = sqlx::query("SELECT 1 FROM artifacts WHERE id = ?")
            .bind(artifact_id)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Err(CoreError::Input(format!(
                "no artifact with id {}",
                artifact_id
            )));
        }

        sqlx::query(
            "INSERT INTO feedback (artifact_id, rating, comment, correction, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(artifact_id)
        .bind(rating)
        .bind(comment)
        .bind(correction)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
