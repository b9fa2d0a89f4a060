//! In-memory approval source.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use promoter_core::ApprovalDecision;

use crate::error::ApprovalError;
use crate::source::{ApprovalSource, DecisionRef, TimeRange};

/// Serves a fixed list of decisions in insertion order.
///
/// The time range is ignored. Listing or individual detail fetches can be
/// made to fail.
#[derive(Debug, Default)]
pub struct InMemoryApprovals {
    decisions: Mutex<Vec<ApprovalDecision>>,
    failing_details: Mutex<HashSet<String>>,
    fail_listing: Mutex<bool>,
    detail_fetches: AtomicUsize,
}

impl InMemoryApprovals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_decision(self, decision: ApprovalDecision) -> Self {
        self.push(decision);
        self
    }

    pub fn push(&self, decision: ApprovalDecision) {
        if let Ok(mut decisions) = self.decisions.lock() {
            decisions.push(decision);
        }
    }

    /// Replace a decision with the same id, e.g. to move it to a new status.
    pub fn update(&self, decision: ApprovalDecision) {
        if let Ok(mut decisions) = self.decisions.lock() {
            match decisions.iter_mut().find(|d| d.id == decision.id) {
                Some(existing) => *existing = decision,
                None => decisions.push(decision),
            }
        }
    }

    pub fn fail_detail(&self, id: &str) {
        if let Ok(mut failing) = self.failing_details.lock() {
            failing.insert(id.to_string());
        }
    }

    pub fn set_listing_fails(&self, fails: bool) {
        if let Ok(mut flag) = self.fail_listing.lock() {
            *flag = fails;
        }
    }

    pub fn detail_fetches(&self) -> usize {
        self.detail_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ApprovalSource for InMemoryApprovals {
    async fn list_decisions(&self, _range: TimeRange) -> Result<Vec<DecisionRef>, ApprovalError> {
        if self.fail_listing.lock().map(|f| *f).unwrap_or(false) {
            return Err(ApprovalError::Transport("listing unavailable".to_string()));
        }
        let decisions = self
            .decisions
            .lock()
            .map_err(|e| ApprovalError::Transport(e.to_string()))?;
        Ok(decisions
            .iter()
            .map(|d| DecisionRef { id: d.id.clone() })
            .collect())
    }

    async fn fetch_detail(&self, id: &str) -> Result<ApprovalDecision, ApprovalError> {
        self.detail_fetches.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failing_details
            .lock()
            .map(|f| f.contains(id))
            .unwrap_or(false);
        if failing {
            return Err(ApprovalError::Status {
                status: 503,
                body: format!("detail for {id} unavailable"),
            });
        }

        let decisions = self
            .decisions
            .lock()
            .map_err(|e| ApprovalError::Transport(e.to_string()))?;
        decisions
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| ApprovalError::Api {
                code: 404,
                msg: format!("instance {id} not found"),
            })
    }
}
