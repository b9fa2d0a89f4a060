//! Approval processor: one pass over the day's decisions.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use promoter_approval::{ApprovalSource, TimeRange};
use promoter_core::{
    ApprovalDecision, ChangeItem, DecisionStatus, DedupGate, DedupRecord, Notifier, RolloutOutcome,
    RolloutResult, Severity, epoch_millis, parse_descriptor,
};
use promoter_rollout::{
    AppliedImage, ConvergenceWatcher, ExecutionError, ImageNaming, RolloutExecutor, WatchError,
};

use crate::error::ProcessError;
use crate::report::{CycleReport, DecisionAction};

const DEFAULT_EXPIRY_GRACE: Duration = Duration::from_secs(60);

/// Something the scheduler can run once per tick.
#[async_trait::async_trait]
pub trait Cycle: Send + Sync {
    async fn run_cycle(&self) -> Result<CycleReport, ProcessError>;
}

pub struct Processor {
    approvals: Arc<dyn ApprovalSource>,
    dedup: Arc<dyn DedupGate>,
    executor: RolloutExecutor,
    watcher: ConvergenceWatcher,
    naming: Box<dyn ImageNaming>,
    notifier: Arc<dyn Notifier>,
    expiry_grace: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Processor {
    pub fn new(
        approvals: Arc<dyn ApprovalSource>,
        dedup: Arc<dyn DedupGate>,
        executor: RolloutExecutor,
        watcher: ConvergenceWatcher,
        notifier: Arc<dyn Notifier>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            approvals,
            dedup,
            executor,
            watcher,
            naming: Box::new(AppliedImage),
            notifier,
            expiry_grace: DEFAULT_EXPIRY_GRACE,
            shutdown,
        }
    }

    pub fn with_naming(mut self, naming: Box<dyn ImageNaming>) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_expiry_grace(mut self, grace: Duration) -> Self {
        self.expiry_grace = grace;
        self
    }

    /// Process every decision listed for today.
    pub async fn process_cycle(&self) -> Result<CycleReport, ProcessError> {
        self.process_range(TimeRange::today()).await
    }

    /// Process every decision listed in `range`, in the listed order.
    ///
    /// Only a listing failure is an error; per-decision failures are
    /// logged and recorded in the report.
    pub async fn process_range(&self, range: TimeRange) -> Result<CycleReport, ProcessError> {
        let mut report = CycleReport {
            started_at_ms: epoch_millis(),
            ..CycleReport::default()
        };

        let listed = self.approvals.list_decisions(range).await?;
        debug!(count = listed.len(), "processing approval decisions");

        for decision in &listed {
            if *self.shutdown.borrow() {
                info!("shutdown requested, ending cycle early");
                report.interrupted = true;
                break;
            }
            let action = self.process_decision(&decision.id, &mut report.outcomes).await;
            report.record(&decision.id, action);
            if action == DecisionAction::Interrupted {
                report.interrupted = true;
                break;
            }
        }

        report.finished_at_ms = epoch_millis();
        Ok(report)
    }

    async fn process_decision(&self, id: &str, outcomes: &mut Vec<RolloutOutcome>) -> DecisionAction {
        match self.dedup.exists(id).await {
            Ok(true) => {
                debug!(decision = %id, "decision already processed");
                return DecisionAction::AlreadyProcessed;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(decision = %id, error = %e, "dedup lookup failed, skipping decision");
                return DecisionAction::DedupUnavailable;
            }
        }

        let decision = match self.approvals.fetch_detail(id).await {
            Ok(d) => d,
            Err(e) => {
                warn!(decision = %id, error = %e, transient = e.is_transient(), "failed to fetch decision detail");
                return DecisionAction::FetchFailed;
            }
        };

        if decision.is_expired(epoch_millis(), self.expiry_grace) {
            info!(decision = %id, expiry_ms = ?decision.expiry_ms, "decision expired, skipping");
            return DecisionAction::Expired;
        }

        match &decision.status {
            DecisionStatus::Approved => {
                info!(decision = %id, "decision approved, rolling out");
                let items = parse_descriptor(&decision.descriptor);
                if items.is_empty() {
                    warn!(decision = %id, "approved decision lists no workloads");
                }
                for item in items {
                    if *self.shutdown.borrow() {
                        break;
                    }
                    outcomes.push(self.promote(item).await);
                }
                // Applies already made are re-applied and verified next run.
                if *self.shutdown.borrow() {
                    warn!(decision = %id, "shutdown during rollout, leaving decision unmarked");
                    return DecisionAction::Interrupted;
                }
                self.mark(&decision, DecisionAction::Approved).await
            }
            DecisionStatus::Rejected => {
                info!(decision = %id, "decision rejected");
                self.mark(&decision, DecisionAction::Rejected).await
            }
            DecisionStatus::Pending => {
                debug!(decision = %id, "decision still pending");
                DecisionAction::Pending
            }
            DecisionStatus::Unknown(raw) => {
                warn!(decision = %id, status = %raw, "unknown decision status, leaving for a later cycle");
                DecisionAction::UnknownStatus
            }
        }
    }

    /// Apply one item and, if the apply succeeded, wait for convergence.
    async fn promote(&self, item: ChangeItem) -> RolloutOutcome {
        let applied = match self.executor.apply(&item.workload, &item.version).await {
            Ok(applied) => applied,
            Err(e @ ExecutionError::NotEligible(_)) => {
                return RolloutOutcome::new(item, RolloutResult::Skipped).with_detail(e.to_string());
            }
            Err(e) => {
                return RolloutOutcome::new(item, RolloutResult::ExecutionFailed).with_detail(e.to_string());
            }
        };

        let expected = self
            .naming
            .expected_image(&item.workload, &item.version, &applied);

        match self
            .watcher
            .watch(&item.workload, &expected, self.shutdown.clone())
            .await
        {
            Ok(converged) => {
                let message = format!(
                    "Workload {} is live on {} (pod {}, {:?})",
                    item.workload, converged.image, converged.pod, converged.elapsed
                );
                self.notifier.notify(&message, &item.workload, Severity::Info).await;
                RolloutOutcome::new(item, RolloutResult::Converged)
            }
            Err(e) => {
                let message = match &e {
                    WatchError::TimedOut { .. } => format!(
                        "Workload {} did not converge on {} within {:?}",
                        item.workload,
                        expected,
                        self.watcher.config().deadline
                    ),
                    _ => e.to_string(),
                };
                self.notifier.notify(&message, &item.workload, Severity::Error).await;

                let result = match e {
                    WatchError::TimedOut { .. } | WatchError::Cancelled(_) => RolloutResult::TimedOut,
                    WatchError::NotFound(_) => RolloutResult::ExecutionFailed,
                };
                RolloutOutcome::new(item, result).with_detail(message)
            }
        }
    }

    async fn mark(&self, decision: &ApprovalDecision, action: DecisionAction) -> DecisionAction {
        match self
            .dedup
            .mark_processed(&decision.id, &DedupRecord::new(decision))
            .await
        {
            Ok(()) => {
                debug!(decision = %decision.id, status = %decision.status, "decision marked processed");
                action
            }
            Err(e) => {
                error!(decision = %decision.id, error = %e, "failed to mark decision processed");
                DecisionAction::MarkFailed
            }
        }
    }
}

#[async_trait::async_trait]
impl Cycle for Processor {
    async fn run_cycle(&self) -> Result<CycleReport, ProcessError> {
        self.process_cycle().await
    }
}
