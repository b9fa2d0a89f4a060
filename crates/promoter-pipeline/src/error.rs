use thiserror::Error;

use promoter_approval::ApprovalError;

/// Failure that ends a whole cycle.
///
/// Everything scoped to a single decision or item is logged and recorded
/// in the [`CycleReport`](crate::CycleReport) instead.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to list approval decisions: {0}")]
    Listing(#[from] ApprovalError),
}
