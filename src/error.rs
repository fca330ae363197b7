//! Error taxonomy for the docledger core.
//!
//! The taxonomy separates caller mistakes from external-service failures and
//! internal races:
//!
//! - [`CoreError::Input`] — the caller's fault (malformed path, embedding
//!   dimension mismatch). Never worth retrying as-is.
//! - [`CoreError::Provider`] — an external provider (embedding API, VCS
//!   change source) failed. Surfaced verbatim; retry policy belongs to the
//!   caller, never to the core.
//! - [`CoreError::Generation`] — the external document generator failed.
//!   Same retry contract as `Provider`.
//! - [`CoreError::Consistency`] — a version/fingerprint mismatch detected
//!   during commit. Resolved by recomputation, never by force-committing.
//! - [`CoreError::Store`] — the backing SQLite store failed.
//!
//! A truncated impact computation is *not* an error — it is a flag on
//! [`crate::models::ImpactSet`].
//!
//! The enum is `Clone` (string payloads only) so that the outcome of a
//! shared in-flight generation can be fanned out to every waiter.

use thiserror::Error;

/// Errors produced by the docledger core and its boundary contracts.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// Malformed caller input; not retried.
    #[error("invalid input: {0}")]
    Input(String),

    /// External provider failure (embedding API, change source).
    #[error("provider error: {0}")]
    Provider(String),

    /// External document generator failure.
    #[error("generation error: {0}")]
    Generation(String),

    /// Lost-update race detected during a commit.
    #[error("consistency error: {0}")]
    Consistency(String),

    /// Backing store failure.
    #[error("store error: {0}")]
    Store(String),
}

impl From<sqlx::Error> for CoreError {
    fn from(e: sqlx::Error) -> Self {
        CoreError::Store(e.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
