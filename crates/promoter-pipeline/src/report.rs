//! Per-cycle summary, exposed on the daemon's status endpoint.

use serde::Serialize;

use promoter_core::{RolloutOutcome, RolloutResult};

/// What a cycle did with one listed decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    /// Dedup record already present.
    AlreadyProcessed,
    /// Dedup lookup failed; retried next cycle.
    DedupUnavailable,
    /// Detail fetch failed; retried next cycle.
    FetchFailed,
    /// Expired before it could be acted on. Not marked.
    Expired,
    /// Rolled out and marked.
    Approved,
    /// Marked without action.
    Rejected,
    Pending,
    UnknownStatus,
    /// Handled, but the dedup mark could not be written.
    MarkFailed,
    /// Shutdown stopped the rollout part-way. Not marked.
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionEntry {
    pub decision: String,
    pub action: DecisionAction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub started_at_ms: u64,
    pub finished_at_ms: u64,
    pub decisions: Vec<DecisionEntry>,
    pub outcomes: Vec<RolloutOutcome>,
    /// Set when shutdown stopped the cycle before every decision was seen.
    pub interrupted: bool,
}

impl CycleReport {
    pub(crate) fn record(&mut self, decision: &str, action: DecisionAction) {
        self.decisions.push(DecisionEntry {
            decision: decision.to_string(),
            action,
        });
    }

    /// Number of decisions that ended with `action`.
    pub fn count(&self, action: DecisionAction) -> usize {
        self.decisions.iter().filter(|d| d.action == action).count()
    }

    /// Number of rollout outcomes with `result`.
    pub fn results(&self, result: RolloutResult) -> usize {
        self.outcomes.iter().filter(|o| o.result == result).count()
    }

    pub fn action_for(&self, decision: &str) -> Option<DecisionAction> {
        self.decisions
            .iter()
            .find(|d| d.decision == decision)
            .map(|d| d.action)
    }
}
