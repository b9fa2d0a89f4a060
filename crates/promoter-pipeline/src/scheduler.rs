//! Scheduler loop: runs one cycle per period until shutdown.
//!
//! Cycles never overlap: the next tick is only awaited after the current
//! cycle returns, and missed ticks are delayed rather than bursted.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::processor::Cycle;
use crate::report::CycleReport;

pub struct Scheduler {
    period: Duration,
    reports: Option<watch::Sender<Option<CycleReport>>>,
}

impl Scheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            reports: None,
        }
    }

    /// Publish each successful cycle's report on `reports`.
    pub fn with_reports(mut self, reports: watch::Sender<Option<CycleReport>>) -> Self {
        self.reports = Some(reports);
        self
    }

    /// Run `cycle` every period. Returns the number of cycles started.
    ///
    /// The first cycle starts immediately. A failed cycle is logged and
    /// the loop carries on.
    pub async fn run(&self, cycle: &dyn Cycle, mut shutdown: watch::Receiver<bool>) -> u64 {
        info!(period = ?self.period, "scheduler started");

        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles = 0u64;

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }

            cycles += 1;
            match cycle.run_cycle().await {
                Ok(report) => {
                    debug!(
                        cycle = cycles,
                        decisions = report.decisions.len(),
                        outcomes = report.outcomes.len(),
                        "cycle finished"
                    );
                    if let Some(tx) = &self.reports {
                        tx.send_replace(Some(report));
                    }
                }
                Err(e) => error!(cycle = cycles, error = %e, "cycle failed"),
            }
        }

        info!(cycles, "scheduler stopped");
        cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessError;
    use promoter_approval::ApprovalError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Counts runs; every `fail_every`th run fails.
    #[derive(Default)]
    struct CountingCycle {
        runs: AtomicU64,
        fail_every: u64,
    }

    #[async_trait::async_trait]
    impl Cycle for CountingCycle {
        async fn run_cycle(&self) -> Result<CycleReport, ProcessError> {
            let n = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_every > 0 && n % self.fail_every == 0 {
                return Err(ProcessError::Listing(ApprovalError::Transport("down".to_string())));
            }
            Ok(CycleReport {
                started_at_ms: n,
                ..CycleReport::default()
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn runs_immediately_then_every_period() {
        let cycle = Arc::new(CountingCycle::default());
        let (tx, rx) = watch::channel(false);

        let task = {
            let cycle = cycle.clone();
            tokio::spawn(async move {
                Scheduler::new(Duration::from_secs(30)).run(cycle.as_ref(), rx).await
            })
        };

        tokio::time::sleep(Duration::from_secs(65)).await;
        tx.send(true).unwrap();
        let started = task.await.unwrap();

        assert_eq!(started, 3);
        assert_eq!(cycle.runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_cycle_does_not_stop_the_loop() {
        let cycle = Arc::new(CountingCycle {
            fail_every: 2,
            ..CountingCycle::default()
        });
        let (tx, rx) = watch::channel(false);
        let (reports_tx, reports_rx) = watch::channel(None);

        let task = {
            let cycle = cycle.clone();
            tokio::spawn(async move {
                Scheduler::new(Duration::from_secs(10))
                    .with_reports(reports_tx)
                    .run(cycle.as_ref(), rx)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_secs(25)).await;
        tx.send(true).unwrap();
        task.await.unwrap();

        assert_eq!(cycle.runs.load(Ordering::SeqCst), 3);
        // Run 2 failed, so the latest published report is run 3.
        let latest = reports_rx.borrow().clone().unwrap();
        assert_eq!(latest.started_at_ms, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn already_shut_down_runs_nothing() {
        let cycle = CountingCycle::default();
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let started = Scheduler::new(Duration::from_secs(1)).run(&cycle, rx).await;

        assert_eq!(started, 0);
    }
}
