//! Domain types shared across the promoter pipeline.
//!
//! An [`ApprovalDecision`] is fetched from the approval service and never
//! persisted here. Each decision's descriptor yields [`ChangeItem`]s, and
//! each item produces one transient [`RolloutOutcome`].

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ── Decisions ──────────────────────────────────────────────────────

/// Status of an approval decision, validated once at the fetch boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Pending,
    Approved,
    Rejected,
    /// Any status string the pipeline does not recognize.
    Unknown(String),
}

impl DecisionStatus {
    /// Map the approval service's raw status string. Matching is exact.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "PENDING" => Self::Pending,
            "APPROVED" => Self::Approved,
            "REJECTED" => Self::Rejected,
            _ => Self::Unknown(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Unknown(raw) => raw,
        }
    }
}

impl std::fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One approval-service record with its form fields resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    /// Stable, unique decision id (the dedup key).
    pub id: String,
    pub status: DecisionStatus,
    /// Raw multi-line change descriptor.
    pub descriptor: String,
    /// Expiry as unix epoch milliseconds, if the service reported one.
    pub expiry_ms: Option<u64>,
    /// Every form field by name, including the descriptor field.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl ApprovalDecision {
    /// Whether `expiry + grace` is already behind `now_ms`.
    ///
    /// A decision without an expiry never expires.
    pub fn is_expired(&self, now_ms: u64, grace: Duration) -> bool {
        match self.expiry_ms {
            Some(expiry) => expiry.saturating_add(grace.as_millis() as u64) < now_ms,
            None => false,
        }
    }
}

/// Persisted marker proving a decision was handled.
///
/// Only the record's existence gates reprocessing; the fields are for
/// operators inspecting the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupRecord {
    pub decision_id: String,
    pub status: String,
    /// Unix epoch milliseconds when the mark was written.
    pub marked_at_ms: u64,
}

impl DedupRecord {
    pub fn new(decision: &ApprovalDecision) -> Self {
        Self {
            decision_id: decision.id.clone(),
            status: decision.status.to_string(),
            marked_at_ms: epoch_millis(),
        }
    }
}

// ── Rollouts ───────────────────────────────────────────────────────

/// A single (workload, version) pair parsed from a descriptor line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeItem {
    pub workload: String,
    pub version: String,
}

impl ChangeItem {
    pub fn new(workload: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            workload: workload.into(),
            version: version.into(),
        }
    }
}

/// Terminal result of promoting one change item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloutResult {
    Converged,
    TimedOut,
    ExecutionFailed,
    /// Rejected by the exclusion policy before touching the cluster.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloutOutcome {
    pub item: ChangeItem,
    pub result: RolloutResult,
    /// Human-readable reason for non-converged results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl RolloutOutcome {
    pub fn new(item: ChangeItem, result: RolloutResult) -> Self {
        Self {
            item,
            result,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Current wall-clock time as unix epoch milliseconds.
pub fn epoch_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(expiry_ms: Option<u64>) -> ApprovalDecision {
        ApprovalDecision {
            id: "inst-1".to_string(),
            status: DecisionStatus::Approved,
            descriptor: String::new(),
            expiry_ms,
            fields: BTreeMap::new(),
        }
    }

    #[test]
    fn status_parse_known_values() {
        assert_eq!(DecisionStatus::parse("APPROVED"), DecisionStatus::Approved);
        assert_eq!(DecisionStatus::parse("REJECTED"), DecisionStatus::Rejected);
        assert_eq!(DecisionStatus::parse("PENDING"), DecisionStatus::Pending);
    }

    #[test]
    fn status_parse_is_case_and_space_sensitive() {
        assert_eq!(
            DecisionStatus::parse("approved"),
            DecisionStatus::Unknown("approved".to_string())
        );
        assert_eq!(
            DecisionStatus::parse(" PENDING "),
            DecisionStatus::Unknown(" PENDING ".to_string())
        );
    }

    #[test]
    fn status_parse_keeps_unknown_raw_value() {
        let status = DecisionStatus::parse("RECALLED");
        assert_eq!(status, DecisionStatus::Unknown("RECALLED".to_string()));
        assert_eq!(status.to_string(), "RECALLED");
    }

    #[test]
    fn decision_without_expiry_never_expires() {
        assert!(!decision(None).is_expired(u64::MAX, Duration::ZERO));
    }

    #[test]
    fn decision_expiry_respects_grace() {
        let d = decision(Some(10_000));
        let grace = Duration::from_secs(60);
        assert!(!d.is_expired(70_000, grace));
        assert!(d.is_expired(70_001, grace));
    }

    #[test]
    fn outcome_detail_serializes_only_when_present() {
        let plain = RolloutOutcome::new(ChangeItem::new("svc", "1.0"), RolloutResult::Converged);
        let json = serde_json::to_string(&plain).unwrap();
        assert!(!json.contains("detail"));

        let failed = plain.clone().with_detail("boom");
        assert_eq!(failed.detail.as_deref(), Some("boom"));
    }
}
