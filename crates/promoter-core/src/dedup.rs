//! The dedup gate: remembers which decisions were already acted on.

use thiserror::Error;

use crate::types::DedupRecord;

/// Failure talking to the dedup store.
#[derive(Debug, Error)]
#[error("dedup store error: {0}")]
pub struct DedupError(pub String);

/// Key-value collaborator gating at-most-once processing.
///
/// Only the existence of a key matters; the stored record is informational.
#[async_trait::async_trait]
pub trait DedupGate: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool, DedupError>;

    async fn mark_processed(&self, key: &str, record: &DedupRecord) -> Result<(), DedupError>;
}
